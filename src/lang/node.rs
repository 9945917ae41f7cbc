use serde::{Deserialize, Serialize};

/// A syntax tree node: a source position plus the kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub pos: u32,
    pub kind: NodeKind,
}

/// Every node kind the parser can hand over.
///
/// Kinds the lowering stage has no case for are still part of this enum so
/// that the walker can report them instead of dropping them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // ───────────────────────────── Structure ─────────────────────────────
    /// Root of a compilation unit.
    SourceFile { statements: Vec<Node> },

    /// `var a: T = x, b;`
    VariableStatement { declarations: Vec<Node> },

    // ─────────────────────────── Keyword types ───────────────────────────
    BooleanKeyword,
    StringKeyword,
    NumberKeyword,
    TrueKeyword,
    FalseKeyword,

    // ───────────────────────────── Literals ──────────────────────────────
    /// Raw literal text, e.g. `1e3`.
    NumericLiteral { text: String },
    /// Raw literal text without the `n` suffix.
    BigIntLiteral { text: String },
    /// Literal contents without quotes.
    StringLiteral { text: String },

    // ─────────────────────────── Type operators ──────────────────────────
    /// `A | B | C`
    UnionType { types: Vec<Node> },

    /// A named type, e.g. `Foo` in `type A = Foo`.
    TypeReference { name: String },

    // ──────────────────────────── Declarations ───────────────────────────
    /// `type Name<T, U> = type`
    TypeAliasDeclaration {
        name: String,
        type_parameters: Vec<TypeParameter>,
        ty: Box<Node>,
    },

    /// `function name(params): return_type { ... }`
    FunctionDeclaration {
        name: Option<String>,
        parameters: Vec<Node>,
        return_type: Option<Box<Node>>,
    },

    /// A single function parameter.
    Parameter { name: String, ty: Option<Box<Node>> },

    /// `name: ty = initializer`
    VariableDeclaration {
        name: Option<String>,
        ty: Option<Box<Node>>,
        initializer: Option<Box<Node>>,
    },

    // ──────────────────────────── Expressions ────────────────────────────
    /// A value-level name, e.g. the `b` in `const a = b`.
    Identifier { name: String },

    /// `expression;`
    ExpressionStatement { expression: Box<Node> },
}

/// A type parameter of a generic declaration, e.g. `T` in `type A<T> = T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParameter {
    pub pos: u32,
    pub name: String,
}

impl Node {
    pub fn new(pos: u32, kind: NodeKind) -> Self {
        Self { pos, kind }
    }

    /// Human-readable name of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::SourceFile { .. } => "source file",
            NodeKind::VariableStatement { .. } => "variable statement",
            NodeKind::BooleanKeyword => "boolean",
            NodeKind::StringKeyword => "string",
            NodeKind::NumberKeyword => "number",
            NodeKind::TrueKeyword => "true",
            NodeKind::FalseKeyword => "false",
            NodeKind::NumericLiteral { .. } => "numeric literal",
            NodeKind::BigIntLiteral { .. } => "bigint literal",
            NodeKind::StringLiteral { .. } => "string literal",
            NodeKind::UnionType { .. } => "union type",
            NodeKind::TypeReference { .. } => "type reference",
            NodeKind::TypeAliasDeclaration { .. } => "type alias declaration",
            NodeKind::FunctionDeclaration { .. } => "function declaration",
            NodeKind::Parameter { .. } => "parameter",
            NodeKind::VariableDeclaration { .. } => "variable declaration",
            NodeKind::Identifier { .. } => "identifier",
            NodeKind::ExpressionStatement { .. } => "expression statement",
        }
    }

    /// Decode a tree from the postcard encoding a parser hands over.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postcard_transport() {
        let tree = Node::new(
            0,
            NodeKind::SourceFile {
                statements: vec![Node::new(
                    0,
                    NodeKind::TypeAliasDeclaration {
                        name: "A".to_string(),
                        type_parameters: vec![TypeParameter {
                            pos: 7,
                            name: "T".to_string(),
                        }],
                        ty: Box::new(Node::new(
                            12,
                            NodeKind::UnionType {
                                types: vec![
                                    Node::new(12, NodeKind::TypeReference { name: "T".into() }),
                                    Node::new(16, NodeKind::StringLiteral { text: "x".into() }),
                                ],
                            },
                        )),
                    },
                )],
            },
        );

        let bytes = tree.to_bytes().unwrap();
        assert_eq!(Node::from_bytes(&bytes).unwrap(), tree);
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let tree = Node::new(3, NodeKind::NumericLiteral { text: "42".into() });
        let bytes = tree.to_bytes().unwrap();
        assert!(Node::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
