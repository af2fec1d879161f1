// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # cdda-core
//!
//! This crate is part of cdda-rs. It provides the selection engine, the decode pipeline, and the
//! sample representation shared by all reader backends.

pub mod audio;
pub mod descriptor;
pub mod errors;
pub mod formats;
pub mod profile;
pub mod queue;
pub mod reader;
pub mod sample;
pub mod selection;
pub mod session;
pub mod sink;
pub mod toc;
