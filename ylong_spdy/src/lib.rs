// Copyright (c) 2023 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![allow(dead_code)]

//! `ylong_spdy` provides the frame-level components of the SPDY-style
//! multiplexed session protocol: the frame model, the name/value header
//! block, shared-context header compression, and the frame encoder and
//! decoder. Session behavior on top of these frames lives in
//! `ylong_spdy_client`.

pub mod compress;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod headers;
