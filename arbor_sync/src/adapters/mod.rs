// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ready-made [`TreeDataService`](crate::TreeDataService) implementations.

pub mod memory;
