// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![no_main]

use cmdlog_schema::analyzer::Validator;
use cmdlog_schema::{ast, parser};
use libfuzzer_sys::fuzz_target;

// Documents validated without errors must load into the typed model.
fuzz_target!(|source: String| {
    let mut sources = ast::SourceDatabase::new();
    let Ok(document) = parser::parse_inline(&mut sources, "input.yaml", source) else {
        return;
    };
    let result = Validator::default().validate(&document);
    if !result.has_errors() {
        if let Err(err) = parser::load(&document) {
            panic!("document without errors failed to load: {}", err);
        }
    }
});
