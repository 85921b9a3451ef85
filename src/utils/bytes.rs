// Copyright 2026 BadCompany
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

//! Byte-slice helpers shared by the builtins and the callback checkers.

/// Whether `needle` occurs in `haystack`; the empty needle always does
pub fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_subslice_edges() {
        assert!(contains_subslice(b"abc", b""));
        assert!(contains_subslice(b"", b""));
        assert!(!contains_subslice(b"ab", b"abc"));
        assert!(contains_subslice(b"xxabcxx", b"abc"));
    }
}
