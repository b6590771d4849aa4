// Copyright 2024 The Harvestman Authors
//
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

//! Small helpers shared across modules.

/// Splits on the whitespace set spec §4.7 names for `meta` tag tokenizing:
/// space, tab, CR, LF, FF.
pub fn tokenize_whitespace(data: &str) -> impl Iterator<Item = &str> {
    data.split(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0C'))
        .filter(|tok| !tok.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_on_all_named_whitespace() {
        let tokens: Vec<&str> = tokenize_whitespace("a b\tc\rd\ne\x0Cf").collect();
        assert_eq!(tokens, vec!["a", "b", "c", "d", "e", "f"]);
    }
}
