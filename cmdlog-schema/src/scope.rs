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

/// Field identifiers visible at the current point of a command walk.
///
/// Identifiers are visible to the nodes declared after them, in the same
/// group or in nested groups. Identifiers declared inside a group go out
/// of scope when the group is closed.
#[derive(Debug)]
pub struct Scope {
    frames: Vec<Vec<String>>,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Scope { frames: vec![vec![]] }
    }

    /// Make `id` visible to the nodes that follow.
    pub fn declare(&mut self, id: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(id.to_owned());
        }
    }

    pub fn resolve(&self, id: &str) -> bool {
        self.frames.iter().rev().any(|frame| frame.iter().any(|declared| declared == id))
    }

    /// Open the scope of a group.
    pub fn enter(&mut self) {
        self.frames.push(vec![]);
    }

    /// Close the innermost group. The command level frame is never
    /// closed.
    pub fn exit(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of open groups.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Visible identifiers, outermost first.
    pub fn visible(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().flatten().map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_declaration_order() {
        let mut scope = Scope::new();
        assert!(!scope.resolve("count"));
        scope.declare("count");
        assert!(scope.resolve("count"));
        assert!(!scope.resolve("size"));
    }

    #[test]
    fn test_group_frames() {
        let mut scope = Scope::new();
        scope.declare("outer");
        scope.enter();
        assert_eq!(scope.depth(), 1);
        assert!(scope.resolve("outer"));
        scope.declare("inner");
        scope.enter();
        assert!(scope.resolve("inner"));
        scope.exit();
        scope.exit();
        assert!(!scope.resolve("inner"));
        assert!(scope.resolve("outer"));
        assert_eq!(scope.visible().collect::<Vec<_>>(), vec!["outer"]);

        // Closing more groups than were opened keeps the command frame.
        scope.exit();
        assert_eq!(scope.depth(), 0);
        assert!(scope.resolve("outer"));
    }
}
