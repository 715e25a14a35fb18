// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

pub mod call_graph_builder;
pub mod fpag_builder;
pub mod pag_builder;
pub mod plugins;
