//! Operator enumerations shared by the expression nodes.

use strum::Display;

/// Assignment operators: `=`, `+=`, `-=`, `*=`, `/=`, `%=`, `<<=`, `>>=`,
/// `|=`, `&=`, `^=`.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum AssignOp {
    #[strum(serialize = "=")]
    Set,
    #[strum(serialize = "+=")]
    Add,
    #[strum(serialize = "-=")]
    Sub,
    #[strum(serialize = "*=")]
    Mul,
    #[strum(serialize = "/=")]
    Div,
    #[strum(serialize = "%=")]
    Mod,
    #[strum(serialize = "<<=")]
    LShift,
    #[strum(serialize = ">>=")]
    RShift,
    #[strum(serialize = "|=")]
    Or,
    #[strum(serialize = "&=")]
    And,
    #[strum(serialize = "^=")]
    Xor,
}

impl AssignOp {
    /// The binary operator of a compound assignment, or `None` for `=`.
    pub fn to_binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
            AssignOp::LShift => Some(BinaryOp::LShift),
            AssignOp::RShift => Some(BinaryOp::RShift),
            AssignOp::Or => Some(BinaryOp::BitOr),
            AssignOp::And => Some(BinaryOp::BitAnd),
            AssignOp::Xor => Some(BinaryOp::BitXor),
        }
    }
}

/// Binary operators: `&&`, `||`, `|`, `^`, `&`, `<<`, `>>`, `+`, `-`, `*`,
/// `/`, `%`, `==`, `!=`, `<`, `>`, `<=`, `>=`.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    #[strum(serialize = "&&")]
    LogicalAnd,
    #[strum(serialize = "||")]
    LogicalOr,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "<<")]
    LShift,
    #[strum(serialize = ">>")]
    RShift,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,
}

impl BinaryOp {
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::BitAnd | BinaryOp::LShift | BinaryOp::RShift
        )
    }

    pub fn is_compare(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEqual
                | BinaryOp::GreaterEqual
        )
    }

    /// Logical or comparison operators yield a boolean-typed result.
    pub fn is_boolean(self) -> bool {
        self.is_logical() || self.is_compare()
    }
}

/// Unary operators: `!`, `~`, `+`, `-`, `++`, `--` (the latter two appear in
/// both pre- and post-fix positions).
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    #[strum(serialize = "!")]
    LogicalNot,
    #[strum(serialize = "~")]
    Not,
    #[strum(serialize = "+")]
    Nop,
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "++")]
    Inc,
    #[strum(serialize = "--")]
    Dec,
}

impl UnaryOp {
    /// `++x` and `--x` write to their operand.
    pub fn is_lvalue_op(self) -> bool {
        matches!(self, UnaryOp::Inc | UnaryOp::Dec)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, UnaryOp::LogicalNot)
    }
}

/// Control transfer statements: `break`, `continue`, `discard`.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum CtrlTransfer {
    #[strum(serialize = "break")]
    Break,
    #[strum(serialize = "continue")]
    Continue,
    #[strum(serialize = "discard")]
    Discard,
}
