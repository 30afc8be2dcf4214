use crate::value::Value;

/// AST node types
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Raw text, emitted verbatim
    Text(String),

    /// `{{path}}` or `{{helper args}}`
    Expression(Call),

    /// `{{#helper args}}...{{else}}...{{/helper}}`
    Block(Block),

    /// `{{> name context key=value}}`
    Partial(PartialCall),
}

/// A helper invocation or plain path lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: PathExpr,
    pub params: Vec<Expr>,
    pub hash: Vec<(String, Expr)>,
    /// Byte offset of the call's name in the source
    pub offset: usize,
}

impl Call {
    pub fn has_arguments(&self) -> bool {
        !self.params.is_empty() || !self.hash.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub call: Call,
    pub program: Vec<Node>,
    pub inverse: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartialCall {
    pub name: PartialName,
    pub context: Option<Expr>,
    pub hash: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartialName {
    Static(String),
    /// `{{> (helper args)}}`, resolved to a name at render time
    Dynamic(Box<Call>),
}

/// Argument expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(PathExpr),
    Literal(Value),
    SubExpr(Box<Call>),
}

/// A dotted path, `this`, or an `@`-prefixed data variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub original: String,
    /// Starts with `@`; the first segment names the data variable
    pub data: bool,
    /// Starts with `this` or is `.`
    pub explicit_this: bool,
    pub segments: Vec<String>,
}

impl PathExpr {
    pub fn parse(original: &str) -> Self {
        if let Some(rest) = original.strip_prefix('@') {
            return Self {
                original: original.to_string(),
                data: true,
                explicit_this: false,
                segments: rest.split('.').map(str::to_string).collect(),
            };
        }

        let mut segments: Vec<String> = if original == "." {
            Vec::new()
        } else {
            original.split('.').map(str::to_string).collect()
        };

        let explicit_this =
            original == "." || segments.first().map(String::as_str) == Some("this");
        if explicit_this && !segments.is_empty() {
            segments.remove(0);
        }

        Self {
            original: original.to_string(),
            data: false,
            explicit_this,
            segments,
        }
    }

    /// Only bare single-segment names may refer to helpers
    pub fn helper_name(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [name] if !self.data && !self.explicit_this => Some(name.as_str()),
            _ => None,
        }
    }
}

/// A compiled template body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub nodes: Vec<Node>,
}

impl Program {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names of statically referenced partials, in order of first appearance
    pub fn partial_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_partial_names(&self.nodes, &mut names);
        names
    }
}

fn collect_partial_names<'a>(nodes: &'a [Node], names: &mut Vec<&'a str>) {
    for node in nodes {
        match node {
            Node::Partial(PartialCall {
                name: PartialName::Static(name),
                ..
            }) => {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
            Node::Block(block) => {
                collect_partial_names(&block.program, names);
                if let Some(inverse) = &block.inverse {
                    collect_partial_names(inverse, names);
                }
            }
            _ => {}
        }
    }
}
