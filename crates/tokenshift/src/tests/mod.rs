//! Cross-cutting suites: the generator walk, transform vectors, randomized
//! interleavings, the typed boundary, and stream properties.

mod generator;
mod typed;

use crate::{GeneratorStream, Scope, TokenStream, TokenValue, tokens};

/// A small literal document, for building test streams and expectations.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    Null,
    Bool(bool),
    I32(i32),
    Str(&'static str),
    Seq(Vec<Tree>),
    Dict(Vec<(&'static str, Tree)>),
}

pub fn seq(items: &[Tree]) -> Tree {
    Tree::Seq(items.to_vec())
}

pub fn dict(pairs: &[(&'static str, Tree)]) -> Tree {
    Tree::Dict(pairs.to_vec())
}

pub fn emit_tree(tree: Tree, scope: &mut Scope) {
    match tree {
        Tree::Null => scope.emit_null(),
        Tree::Bool(b) => scope.emit_bool(move || b),
        Tree::I32(n) => scope.emit_i32(move || n),
        Tree::Str(s) => scope.emit_str(move || s.to_owned()),
        Tree::Seq(items) => scope.emit_sequence(move |scope| {
            for item in items {
                emit_tree(item, scope);
            }
        }),
        Tree::Dict(pairs) => scope.emit_dictionary(move |scope| {
            for (name, value) in pairs {
                scope.emit_str(move || name.to_owned());
                emit_tree(value, scope);
            }
        }),
    }
}

pub fn stream_of(tree: Tree) -> GeneratorStream {
    tokens(move |scope| emit_tree(tree, scope))
}

pub fn collect<S: TokenStream>(mut stream: S) -> Vec<TokenValue> {
    let mut out = Vec::new();
    while stream.has_next() {
        out.push(stream.poll(None).unwrap());
    }
    out
}

/// Assert that `actual` surfaces exactly the tokens of `expected`.
pub fn assert_stream_eq<S: TokenStream>(expected: &Tree, actual: S) {
    assert_eq!(collect(actual), collect(stream_of(expected.clone())));
}

/// A tiny deterministic generator, so interleaving choices are reproducible
/// per seed.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }
}
