use serde::Serialize;
use tree_sitter::Node;

/// The closed set of tree-sitter node kinds code-atlas reacts to.
///
/// Grammar node-type strings are mapped exactly once, in [`SyntaxKind::of`]; every
/// extraction pass then dispatches with an exhaustive `match`, so adding a kind is a
/// compile-checked change rather than a new string comparison scattered across visitors.
/// TypeScript and JavaScript spellings of the same construct collapse to one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    Program,
    FunctionDeclaration,
    FunctionExpression,
    ArrowFunction,
    MethodDefinition,
    ClassDeclaration,
    ClassBody,
    FieldDefinition,
    CallExpression,
    NewExpression,
    MemberExpression,
    VariableDeclarator,
    AssignmentExpression,
    ImportStatement,
    ExportStatement,
    StatementBlock,
    Comment,
    If,
    Else,
    For,
    ForIn,
    While,
    DoWhile,
    Switch,
    SwitchCase,
    SwitchDefault,
    Try,
    Catch,
    Ternary,
    Binary,
    Return,
    Throw,
    Await,
    Other,
}

impl SyntaxKind {
    pub fn of(node: Node) -> Self {
        // Keyword tokens such as `class` or `function` share their spelling with named kinds.
        if !node.is_named() {
            return SyntaxKind::Other;
        }
        Self::from_kind_str(node.kind())
    }

    pub fn from_kind_str(kind: &str) -> Self {
        match kind {
            "program" => SyntaxKind::Program,
            "function_declaration" | "generator_function_declaration" => {
                SyntaxKind::FunctionDeclaration
            }
            "function_expression" | "function" | "generator_function" => {
                SyntaxKind::FunctionExpression
            }
            "arrow_function" => SyntaxKind::ArrowFunction,
            "method_definition" => SyntaxKind::MethodDefinition,
            "class_declaration" | "abstract_class_declaration" | "class" => {
                SyntaxKind::ClassDeclaration
            }
            "class_body" => SyntaxKind::ClassBody,
            "field_definition" | "public_field_definition" => SyntaxKind::FieldDefinition,
            "call_expression" => SyntaxKind::CallExpression,
            "new_expression" => SyntaxKind::NewExpression,
            "member_expression" => SyntaxKind::MemberExpression,
            "variable_declarator" => SyntaxKind::VariableDeclarator,
            "assignment_expression" => SyntaxKind::AssignmentExpression,
            "import_statement" => SyntaxKind::ImportStatement,
            "export_statement" => SyntaxKind::ExportStatement,
            "statement_block" => SyntaxKind::StatementBlock,
            "comment" => SyntaxKind::Comment,
            "if_statement" => SyntaxKind::If,
            "else_clause" => SyntaxKind::Else,
            "for_statement" => SyntaxKind::For,
            "for_in_statement" => SyntaxKind::ForIn,
            "while_statement" => SyntaxKind::While,
            "do_statement" => SyntaxKind::DoWhile,
            "switch_statement" => SyntaxKind::Switch,
            "switch_case" => SyntaxKind::SwitchCase,
            "switch_default" => SyntaxKind::SwitchDefault,
            "try_statement" => SyntaxKind::Try,
            "catch_clause" => SyntaxKind::Catch,
            "ternary_expression" => SyntaxKind::Ternary,
            "binary_expression" => SyntaxKind::Binary,
            "return_statement" => SyntaxKind::Return,
            "throw_statement" => SyntaxKind::Throw,
            "await_expression" => SyntaxKind::Await,
            _ => SyntaxKind::Other,
        }
    }

    /// True for nodes that open a new function body.
    pub fn is_function(&self) -> bool {
        matches!(
            self,
            SyntaxKind::FunctionDeclaration
                | SyntaxKind::FunctionExpression
                | SyntaxKind::ArrowFunction
                | SyntaxKind::MethodDefinition
        )
    }

    /// The control-flow token this node contributes to a function's structure, if any.
    ///
    /// `Binary` only counts for short-circuit operators; the operator is read from the node.
    pub fn flow_token(&self, node: Node) -> Option<FlowToken> {
        match self {
            SyntaxKind::If => Some(FlowToken::If),
            SyntaxKind::Else => Some(FlowToken::Else),
            SyntaxKind::For => Some(FlowToken::For),
            SyntaxKind::ForIn => Some(FlowToken::ForIn),
            SyntaxKind::While => Some(FlowToken::While),
            SyntaxKind::DoWhile => Some(FlowToken::DoWhile),
            SyntaxKind::Switch => Some(FlowToken::Switch),
            SyntaxKind::SwitchCase => Some(FlowToken::Case),
            SyntaxKind::SwitchDefault => Some(FlowToken::DefaultCase),
            SyntaxKind::Try => Some(FlowToken::Try),
            SyntaxKind::Catch => Some(FlowToken::Catch),
            SyntaxKind::Ternary => Some(FlowToken::Ternary),
            SyntaxKind::Return => Some(FlowToken::Return),
            SyntaxKind::Throw => Some(FlowToken::Throw),
            SyntaxKind::Await => Some(FlowToken::Await),
            SyntaxKind::Binary => match node.child_by_field_name("operator").map(|op| op.kind()) {
                Some("&&") => Some(FlowToken::And),
                Some("||") => Some(FlowToken::Or),
                Some("??") => Some(FlowToken::Nullish),
                _ => None,
            },
            SyntaxKind::Program
            | SyntaxKind::FunctionDeclaration
            | SyntaxKind::FunctionExpression
            | SyntaxKind::ArrowFunction
            | SyntaxKind::MethodDefinition
            | SyntaxKind::ClassDeclaration
            | SyntaxKind::ClassBody
            | SyntaxKind::FieldDefinition
            | SyntaxKind::CallExpression
            | SyntaxKind::NewExpression
            | SyntaxKind::MemberExpression
            | SyntaxKind::VariableDeclarator
            | SyntaxKind::AssignmentExpression
            | SyntaxKind::ImportStatement
            | SyntaxKind::ExportStatement
            | SyntaxKind::StatementBlock
            | SyntaxKind::Comment
            | SyntaxKind::Other => None,
        }
    }
}

/// One entry of a function's structural hash: the ordered control-flow node kinds
/// found in its body (nested function bodies excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowToken {
    If,
    Else,
    For,
    ForIn,
    While,
    DoWhile,
    Switch,
    Case,
    DefaultCase,
    Try,
    Catch,
    Ternary,
    And,
    Or,
    Nullish,
    Return,
    Throw,
    Await,
}

impl FlowToken {
    /// True for tokens that add a decision point to cyclomatic complexity.
    pub fn is_decision(&self) -> bool {
        match self {
            FlowToken::If
            | FlowToken::For
            | FlowToken::ForIn
            | FlowToken::While
            | FlowToken::DoWhile
            | FlowToken::Case
            | FlowToken::Catch
            | FlowToken::Ternary
            | FlowToken::And
            | FlowToken::Or
            | FlowToken::Nullish => true,
            FlowToken::Else
            | FlowToken::Switch
            | FlowToken::DefaultCase
            | FlowToken::Try
            | FlowToken::Return
            | FlowToken::Throw
            | FlowToken::Await => false,
        }
    }
}
