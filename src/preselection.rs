//! Boolean preselection expressions over NanoAOD-style branch names
//!
//! Supports arithmetic (`+ - * /`), comparisons (`== != < <= > >=`), boolean
//! operators (`&& || !`), the functions `abs`, `sqrt`, `min` and `max`, and
//! `Sum$(expr)`, which sums `expr` over the objects of the collections that it
//! references. Missing branches evaluate to NaN, which fails every comparison.

use crate::{
    event::{CollectionKind, Event},
    numeric::Real,
};
use eyre::{bail, ensure, eyre, Result};
use std::fmt;

/// A branch which an expression reads
#[derive(Clone, Debug, PartialEq)]
enum Branch {
    /// `HLT_<path>`, 1 or 0
    Hlt(String),
    /// `L1_<seed>`, 1 or 0
    L1(String),
    /// `PV_npvsGood`
    NumGoodVertices,
    /// `MET_pt`
    MetPt,
    /// `MET_phi`
    MetPhi,
    /// `n<Collection>`
    Count(CollectionKind),
    /// `<Collection>_<field>`, only meaningful inside `Sum$`
    Field(CollectionKind, &'static str),
}
//
impl Branch {
    /// Map a branch name to the event data it reads
    fn resolve(name: &str) -> Result<Self> {
        if let Some(path) = name.strip_prefix("HLT_") {
            return Ok(Self::Hlt(path.to_owned()));
        }
        if let Some(seed) = name.strip_prefix("L1_") {
            return Ok(Self::L1(seed.to_owned()));
        }
        match name {
            "PV_npvsGood" => return Ok(Self::NumGoodVertices),
            "MET_pt" => return Ok(Self::MetPt),
            "MET_phi" => return Ok(Self::MetPhi),
            _ => {}
        }
        for kind in CollectionKind::ALL {
            if name.strip_prefix('n') == Some(kind.prefix()) {
                return Ok(Self::Count(kind));
            }
            if let Some(field) = name
                .strip_prefix(kind.prefix())
                .and_then(|rest| rest.strip_prefix('_'))
            {
                let field = kind
                    .fields()
                    .iter()
                    .copied()
                    .find(|&known| known == field)
                    .ok_or_else(|| eyre!("Unknown branch '{name}'"))?;
                return Ok(Self::Field(kind, field));
            }
        }
        bail!("Unknown branch '{name}'")
    }

    /// Read the branch, given the index of the current object inside `Sum$`
    fn value(&self, event: &Event, index: Option<usize>) -> Real {
        let bit = |b: Option<bool>| b.map_or(Real::NAN, |b| if b { 1. } else { 0. });
        match self {
            Self::Hlt(path) => bit(event.hlt.get(path)),
            Self::L1(seed) => bit(event.l1.get(seed)),
            Self::NumGoodVertices => event.pv.as_ref().map_or(Real::NAN, |pv| pv.npvs_good.into()),
            Self::MetPt => event.met.as_ref().map_or(Real::NAN, |met| met.pt.into()),
            Self::MetPhi => event.met.as_ref().map_or(Real::NAN, |met| met.phi.into()),
            Self::Count(kind) => event.collection_len(*kind) as Real,
            Self::Field(kind, field) => index
                .and_then(|i| event.collection_field(*kind, i, field))
                .unwrap_or(Real::NAN),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Func {
    Abs,
    Sqrt,
    Min,
    Max,
}
//
impl Func {
    fn lookup(name: &str) -> Option<(Self, usize)> {
        match name {
            "abs" => Some((Self::Abs, 1)),
            "sqrt" => Some((Self::Sqrt, 1)),
            "min" => Some((Self::Min, 2)),
            "max" => Some((Self::Max, 2)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Number(Real),
    Branch(Branch),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
    /// Sum over the objects of the listed collections
    Sum(Box<Expr>, Vec<CollectionKind>),
}
//
impl Expr {
    fn eval(&self, event: &Event, index: Option<usize>) -> Real {
        let truth = |b: bool| if b { 1. } else { 0. };
        match self {
            Self::Number(x) => *x,
            Self::Branch(branch) => branch.value(event, index),
            Self::Neg(a) => -a.eval(event, index),
            Self::Not(a) => truth(!(a.eval(event, index) > 0.)),
            Self::Binary(op, a, b) => {
                let lhs = a.eval(event, index);
                let rhs = b.eval(event, index);
                match op {
                    BinOp::Add => lhs + rhs,
                    BinOp::Sub => lhs - rhs,
                    BinOp::Mul => lhs * rhs,
                    BinOp::Div => lhs / rhs,
                    BinOp::Eq => truth(lhs == rhs),
                    BinOp::Ne => truth(lhs != rhs && !lhs.is_nan() && !rhs.is_nan()),
                    BinOp::Lt => truth(lhs < rhs),
                    BinOp::Le => truth(lhs <= rhs),
                    BinOp::Gt => truth(lhs > rhs),
                    BinOp::Ge => truth(lhs >= rhs),
                    BinOp::And => truth(lhs > 0. && rhs > 0.),
                    BinOp::Or => truth(lhs > 0. || rhs > 0.),
                }
            }
            Self::Call(func, args) => {
                let arg = |i: usize| args[i].eval(event, index);
                match func {
                    Func::Abs => arg(0).abs(),
                    Func::Sqrt => arg(0).sqrt(),
                    Func::Min => arg(0).min(arg(1)),
                    Func::Max => arg(0).max(arg(1)),
                }
            }
            Self::Sum(inner, collections) => {
                let len = collections
                    .iter()
                    .map(|&kind| event.collection_len(kind))
                    .min()
                    .unwrap_or(1);
                (0..len).map(|i| inner.eval(event, Some(i))).sum()
            }
        }
    }

    /// Collections whose fields this expression reads
    fn collections(&self, out: &mut Vec<CollectionKind>) {
        match self {
            Self::Branch(Branch::Field(kind, _)) => {
                if !out.contains(kind) {
                    out.push(*kind);
                }
            }
            Self::Number(_) | Self::Branch(_) | Self::Sum(..) => {}
            Self::Neg(a) | Self::Not(a) => a.collections(out),
            Self::Binary(_, a, b) => {
                a.collections(out);
                b.collections(out);
            }
            Self::Call(_, args) => args.iter().for_each(|a| a.collections(out)),
        }
    }
}

// ### TOKENIZER ###

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Num(Real),
    Ident(String),
    Op(BinOp),
    Minus,
    Not,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars = input.char_indices().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        // Two-character operators first
        let two = match (c, next) {
            ('&', Some('&')) => Some(Token::Op(BinOp::And)),
            ('|', Some('|')) => Some(Token::Op(BinOp::Or)),
            ('=', Some('=')) => Some(Token::Op(BinOp::Eq)),
            ('!', Some('=')) => Some(Token::Op(BinOp::Ne)),
            ('<', Some('=')) => Some(Token::Op(BinOp::Le)),
            ('>', Some('=')) => Some(Token::Op(BinOp::Ge)),
            _ => None,
        };
        if let Some(token) = two {
            tokens.push(token);
            i += 2;
            continue;
        }

        match c {
            _ if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Op(BinOp::Add));
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Op(BinOp::Mul));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Op(BinOp::Div));
                i += 1;
            }
            '<' => {
                tokens.push(Token::Op(BinOp::Lt));
                i += 1;
            }
            '>' => {
                tokens.push(Token::Op(BinOp::Gt));
                i += 1;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() {
                    let (_, d) = chars[i];
                    let exponent_sign = (d == '+' || d == '-')
                        && i > start
                        && matches!(chars[i - 1].1, 'e' | 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let end = chars.get(i).map_or(input.len(), |&(p, _)| p);
                let text = &input[pos..end];
                let value = text
                    .parse::<Real>()
                    .map_err(|_| eyre!("Invalid number '{text}'"))?;
                tokens.push(Token::Num(value));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                // ROOT-style special functions end with a dollar sign
                if chars.get(i).map(|&(_, c)| c) == Some('$') {
                    i += 1;
                }
                let end = chars.get(i).map_or(input.len(), |&(p, _)| p);
                tokens.push(Token::Ident(input[pos..end].to_owned()));
            }
            _ => bail!("Unexpected character '{c}' at position {pos}"),
        }
    }
    Ok(tokens)
}

// ### PARSER ###

/// Recursive descent parser, one method per precedence level
struct Parser<'tokens> {
    tokens: &'tokens [Token],
    pos: usize,
}
//
impl<'tokens> Parser<'tokens> {
    fn peek(&self) -> Option<&'tokens Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'tokens Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => bail!("Expected {expected:?}, found {other:?}"),
        }
    }

    /// Parse a left-associative chain of the given binary operators
    fn binary_level(
        &mut self,
        ops: &[BinOp],
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut lhs = operand(self)?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(op)) if ops.contains(op) => *op,
                Some(Token::Minus) if ops.contains(&BinOp::Sub) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = operand(self)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn or(&mut self) -> Result<Expr> {
        self.binary_level(&[BinOp::Or], Self::and)
    }

    fn and(&mut self) -> Result<Expr> {
        self.binary_level(&[BinOp::And], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr> {
        use BinOp::*;
        self.binary_level(&[Eq, Ne, Lt, Le, Gt, Ge], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr> {
        self.binary_level(&[BinOp::Add, BinOp::Sub], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        self.binary_level(&[BinOp::Mul, BinOp::Div], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Expr::Not(Box::new(self.unary()?)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Num(x)) => Ok(Expr::Number(*x)),
            Some(Token::LParen) => {
                let inner = self.or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                self.call(name)
            }
            Some(Token::Ident(name)) => Ok(Expr::Branch(Branch::resolve(name)?)),
            other => bail!("Unexpected token {other:?}"),
        }
    }

    /// Parse the arguments of a function call, opening parenthesis consumed
    fn call(&mut self, name: &str) -> Result<Expr> {
        let mut args = vec![self.or()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.or()?);
        }
        self.expect(&Token::RParen)?;

        if name == "Sum$" {
            ensure!(args.len() == 1, "Sum$ takes exactly one argument");
            let inner = args.remove(0);
            let mut collections = Vec::new();
            inner.collections(&mut collections);
            return Ok(Expr::Sum(Box::new(inner), collections));
        }

        let (func, arity) = Func::lookup(name).ok_or_else(|| eyre!("Unknown function '{name}'"))?;
        ensure!(
            args.len() == arity,
            "{name} takes {arity} argument(s), got {}",
            args.len()
        );
        Ok(Expr::Call(func, args))
    }
}

/// A compiled preselection
#[derive(Clone, Debug, PartialEq)]
pub struct Preselection {
    /// Text which this was compiled from
    source: String,

    /// Parsed expression, None if every event is accepted
    expr: Option<Expr>,
}
//
impl Preselection {
    /// Parse an expression. An empty expression accepts every event.
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let expr = if tokens.is_empty() {
            None
        } else {
            let mut parser = Parser {
                tokens: &tokens,
                pos: 0,
            };
            let expr = parser.or()?;
            if let Some(token) = parser.peek() {
                bail!("Unexpected token {token:?} after end of expression");
            }
            Some(expr)
        };
        Ok(Self {
            source: source.trim().to_owned(),
            expr,
        })
    }

    /// Truth that an event passes the preselection
    pub fn accepts(&self, event: &Event) -> bool {
        self.expr
            .as_ref()
            .map_or(true, |expr| expr.eval(event, None) > 0.)
    }

    /// Text of the expression
    pub fn source(&self) -> &str {
        &self.source
    }
}
//
impl fmt::Display for Preselection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source() {
            "" => write!(f, "(none)"),
            source => write!(f, "{source}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{testing::*, Met, PrimaryVertices};

    const AK8_PRESELECTION: &str = "(HLT_Mu50 == 1 || HLT_IsoMu24 == 1) && \
                                    (Sum$(FatJet_pt > 200 && abs(FatJet_eta)<2.5) > 0)";

    fn event_with(hlt: &[&str], fat_jets: Vec<crate::event::FatJet>) -> Event {
        Event {
            hlt: fired(hlt),
            fat_jets,
            ..Event::default()
        }
    }

    #[test]
    fn reference_trigger_expression() {
        let presel = Preselection::compile("(HLT_Mu50 == 1 || HLT_IsoMu24 == 1)").unwrap();
        assert!(presel.accepts(&event_with(&["IsoMu24"], vec![])));
        assert!(presel.accepts(&event_with(&["Mu50"], vec![])));
        assert!(!presel.accepts(&event_with(&["PFHT1050"], vec![])));
    }

    #[test]
    fn sums_over_collections() {
        let presel = Preselection::compile(AK8_PRESELECTION).unwrap();
        let central = fat_jet(250., 60., 1.0, 0.);
        let forward = fat_jet(250., 60., 2.7, 0.);
        let soft = fat_jet(150., 60., 0.0, 0.);
        assert!(presel.accepts(&event_with(&["Mu50"], vec![soft.clone(), central])));
        assert!(!presel.accepts(&event_with(&["Mu50"], vec![soft, forward.clone()])));
        assert!(!presel.accepts(&event_with(&["Mu50"], vec![])));
        assert!(!presel.accepts(&event_with(&[], vec![fat_jet(250., 60., 1.0, 0.)])));

        let counter = Preselection::compile("Sum$(FatJet_pt > 100) == 2").unwrap();
        assert!(counter.accepts(&event_with(&[], vec![forward.clone(), forward])));
    }

    #[test]
    fn scalar_branches_and_arithmetic() {
        let event = Event {
            met: Some(Met { pt: 150., phi: 0. }),
            pv: Some(PrimaryVertices { npvs_good: 20 }),
            muons: vec![good_muon(30., 0., 0.)],
            ..Event::default()
        };
        let accepts = |src: &str| Preselection::compile(src).unwrap().accepts(&event);
        assert!(accepts("MET_pt > 2 * 70 + 5"));
        assert!(accepts("-MET_pt < -100 && PV_npvsGood >= 20"));
        assert!(accepts("nMuon == 1 && nJet == 0"));
        assert!(accepts("max(MET_pt, 10) / 3 == 50"));
        assert!(accepts("!(MET_phi != 0)"));
        assert!(accepts("sqrt(PV_npvsGood - 4) == 4"));
        assert!(accepts("1.5e2 == MET_pt"));
    }

    #[test]
    fn missing_branches_fail_comparisons() {
        let event = Event::default();
        let accepts = |src: &str| Preselection::compile(src).unwrap().accepts(&event);
        assert!(!accepts("MET_pt > 0"));
        assert!(!accepts("MET_pt <= 0"));
        assert!(!accepts("HLT_Mu50 == 1"));
        assert!(!accepts("HLT_Mu50 != 1"));
        // Collection fields only make sense inside Sum$
        assert!(!accepts("Muon_pt > 0 || Muon_pt <= 0"));
    }

    #[test]
    fn empty_expression_accepts_everything() {
        let presel = Preselection::compile("   ").unwrap();
        assert!(presel.accepts(&Event::default()));
        assert_eq!(presel.to_string(), "(none)");
    }

    #[test]
    fn rejects_malformed_expressions() {
        for bad in [
            "HLT_Mu50 ==",
            "(HLT_Mu50 == 1",
            "Electron_pt > 3",
            "FatJet_mass > 3",
            "foo(1)",
            "abs(1, 2)",
            "Sum$(1, 2)",
            "MET_pt > 3 3",
            "MET_pt # 3",
            "1.2.3 > 0",
        ] {
            assert!(Preselection::compile(bad).is_err(), "{bad} should not compile");
        }
    }
}
