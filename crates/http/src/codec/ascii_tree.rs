/// A character trie over a small fixed set of ASCII words.
///
/// Used to recognize methods and versions on the start line without
/// materializing the token.
#[derive(Debug)]
pub(crate) struct AsciiCharTree<T> {
    root: Vec<Node<T>>,
}

#[derive(Debug)]
struct Node<T> {
    ch: char,
    exact: Option<T>,
    children: Vec<Node<T>>,
}

impl<T: Copy> AsciiCharTree<T> {
    pub(crate) fn build(words: impl IntoIterator<Item = (&'static str, T)>) -> Self {
        let mut root = Vec::new();
        for (word, value) in words {
            debug_assert!(!word.is_empty() && word.is_ascii(), "only non empty ascii words are supported: {word:?}");
            insert(&mut root, word, value);
        }
        Self { root }
    }

    /// Walks `chars` until `stop` matches or the input ends.
    ///
    /// Returns the value of the word spelled by the consumed characters and
    /// the number of characters consumed, or `None` if they don't spell
    /// exactly one of the words.
    pub(crate) fn search(&self, chars: impl Iterator<Item = char>, stop: impl Fn(char) -> bool) -> Option<(T, usize)> {
        let mut level = &self.root;
        let mut current = None;
        let mut consumed = 0;

        for ch in chars {
            if stop(ch) {
                break;
            }
            let node = level.iter().find(|node| node.ch == ch)?;
            current = Some(node);
            level = &node.children;
            consumed += 1;
        }

        current.and_then(|node| node.exact).map(|value| (value, consumed))
    }
}

fn insert<T>(level: &mut Vec<Node<T>>, word: &str, value: T) {
    let mut chars = word.chars();
    let Some(ch) = chars.next() else {
        return;
    };

    let index = match level.iter().position(|node| node.ch == ch) {
        Some(index) => index,
        None => {
            level.push(Node { ch, exact: None, children: Vec::new() });
            level.len() - 1
        }
    };

    let node = &mut level[index];
    let rest = chars.as_str();
    if rest.is_empty() {
        node.exact = Some(value);
    } else {
        insert(&mut node.children, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> AsciiCharTree<u8> {
        AsciiCharTree::build([("GET", 1), ("POST", 2), ("PUT", 3), ("PUTS", 4)])
    }

    #[test]
    fn exact_words() {
        let tree = tree();
        let space = |ch| ch == ' ';

        assert_eq!(tree.search("GET /".chars(), space), Some((1, 3)));
        assert_eq!(tree.search("PUT".chars(), space), Some((3, 3)));
        assert_eq!(tree.search("PUTS /x".chars(), space), Some((4, 4)));
        assert_eq!(tree.search("POST".chars(), space), Some((2, 4)));
    }

    #[test]
    fn prefixes_and_unknown_words() {
        let tree = tree();
        let space = |ch| ch == ' ';

        assert_eq!(tree.search("PU /".chars(), space), None);
        assert_eq!(tree.search("GETS /".chars(), space), None);
        assert_eq!(tree.search("get /".chars(), space), None);
        assert_eq!(tree.search("".chars(), space), None);
        assert_eq!(tree.search(" GET".chars(), space), None);
    }
}
