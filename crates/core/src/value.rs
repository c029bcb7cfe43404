use crate::env::Env;
use crate::error::SlangResult;
use crate::process::{DataflowVar, Mailbox, ProcessRef};
use crate::stack::Stack;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Interned-by-sharing identifier used for words, symbols and binding names
pub type Name = Rc<str>;

/// A flattened name -> value mapping (one environment frame, a closure
/// snapshot, or a vocabulary)
pub type Bindings = HashMap<Name, Value>;

/// What a continuation receives: the stack to carry on with, or the failure
/// that ended the chain
pub type Outcome = SlangResult<Stack>;

/// Value kinds, used for type-assertion failures and `Display` of errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Nil,
    Number,
    String,
    Word,
    Symbol,
    Bool,
    Block,
    Primitive,
    Vocabulary,
    Object,
    Process,
    Mailbox,
    Dataflow,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Nil => "nil",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Word => "word",
            Kind::Symbol => "symbol",
            Kind::Bool => "bool",
            Kind::Block => "block",
            Kind::Primitive => "primitive",
            Kind::Vocabulary => "vocabulary",
            Kind::Object => "object",
            Kind::Process => "process",
            Kind::Mailbox => "mailbox",
            Kind::Dataflow => "dfvar",
        };
        f.write_str(name)
    }
}

/// Value: What the language talks about
///
/// Every instruction in a program is also a `Value`: the reader produces
/// numbers, strings, words, symbols and nested blocks, and the interpreter
/// loop decides what each one means when it reaches it.
///
/// Values are immutable except for three interior cells:
/// - a block's captured bindings, written once when the literal is first
///   instantiated
/// - an object's property map
/// - a dataflow variable's value, written once by the first `bind`
///
/// Cloning is O(1) for every heap-backed kind (an `Rc` bump).
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value: the parent of a root process, an unresolved word
    Nil,

    /// IEEE 754 double
    Number(f64),

    /// Immutable text
    Str(Rc<str>),

    /// A name looked up in the environment when the interpreter reaches it
    Word(Name),

    /// A self-evaluating name, used as data (binding names, message keys)
    Symbol(Name),

    Bool(bool),

    /// Instruction sequence plus its captured bindings (once instantiated)
    Block(Rc<Block>),

    /// Native behavior, synchronous or asynchronous
    Primitive(Rc<Primitive>),

    /// First-class module: a flattened set of bindings
    Vocab(Rc<Vocab>),

    /// Property map plus the vocabulary that answers its messages
    Object(Rc<Object>),

    /// Cooperatively scheduled unit of execution
    Process(ProcessRef),

    /// FIFO message queue with at most one waiting receiver
    Mailbox(Rc<Mailbox>),

    /// Single-assignment synchronization cell
    Dataflow(Rc<DataflowVar>),
}

impl Value {
    pub fn word(name: &str) -> Value {
        Value::Word(Rc::from(name))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    pub fn string(text: &str) -> Value {
        Value::Str(Rc::from(text))
    }

    pub fn block(code: Vec<Value>) -> Value {
        Value::Block(Rc::new(Block::new(code)))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Number(_) => Kind::Number,
            Value::Str(_) => Kind::String,
            Value::Word(_) => Kind::Word,
            Value::Symbol(_) => Kind::Symbol,
            Value::Bool(_) => Kind::Bool,
            Value::Block(_) => Kind::Block,
            Value::Primitive(_) => Kind::Primitive,
            Value::Vocab(_) => Kind::Vocabulary,
            Value::Object(_) => Kind::Object,
            Value::Process(_) => Kind::Process,
            Value::Mailbox(_) => Kind::Mailbox,
            Value::Dataflow(_) => Kind::Dataflow,
        }
    }

    /// `false`, `nil` and `0` are false; everything else is true
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil | Value::Bool(false) => false,
            Value::Number(n) => *n != 0.0,
            _ => true,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

// Scalars compare by content, names by text, everything else by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Word(a), Value::Word(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Block(a), Value::Block(b)) => Rc::ptr_eq(a, b),
            (Value::Primitive(a), Value::Primitive(b)) => Rc::ptr_eq(a, b),
            (Value::Vocab(a), Value::Vocab(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Process(a), Value::Process(b)) => Rc::ptr_eq(a, b),
            (Value::Mailbox(a), Value::Mailbox(b)) => Rc::ptr_eq(a, b),
            (Value::Dataflow(a), Value::Dataflow(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Block: a literal instruction sequence that becomes a closure when the
/// interpreter first pushes it
///
/// The captured bindings are written exactly once. Pushing the same literal
/// again reuses the snapshot taken the first time.
pub struct Block {
    code: Rc<[Value]>,
    captured: OnceCell<Rc<Bindings>>,
}

impl Block {
    pub fn new(code: Vec<Value>) -> Self {
        Block {
            code: code.into(),
            captured: OnceCell::new(),
        }
    }

    pub fn code(&self) -> &Rc<[Value]> {
        &self.code
    }

    /// The closure snapshot, if this literal has been instantiated
    pub fn captured(&self) -> Option<&Rc<Bindings>> {
        self.captured.get()
    }

    pub fn is_instantiated(&self) -> bool {
        self.captured.get().is_some()
    }

    /// Record the closure snapshot; a block that already has one keeps it
    pub fn capture_with(&self, scan: impl FnOnce() -> Bindings) -> &Rc<Bindings> {
        self.captured.get_or_init(|| Rc::new(scan()))
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.code.len())
            .field("instantiated", &self.is_instantiated())
            .finish()
    }
}

/// Continuation: the rest of a computation, resumed exactly once
///
/// Asynchronous primitives receive one and own it from then on. Consuming
/// `self` in [`Continuation::resume`] makes a second resumption a compile
/// error rather than a runtime hazard.
pub struct Continuation(Box<dyn FnOnce(Outcome)>);

impl Continuation {
    pub fn new(f: impl FnOnce(Outcome) + 'static) -> Self {
        Continuation(Box::new(f))
    }

    pub fn resume(self, outcome: Outcome) {
        (self.0)(outcome)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Continuation")
    }
}

/// `( env stack -- stack )`: runs to completion within the caller's turn
pub type SyncFn = dyn Fn(&Env, Stack) -> SlangResult<Stack>;

/// `( env stack k -- )`: takes over control and resumes `k` on a later turn
pub type AsyncFn = dyn Fn(&Env, Stack, Continuation);

#[derive(Clone)]
pub enum Behavior {
    Sync(Rc<SyncFn>),
    Async(Rc<AsyncFn>),
}

/// Primitive: a named native behavior
///
/// The calling convention is explicit in [`Behavior`]; the interpreter loop
/// matches on it to decide whether to continue inline or hand over control.
pub struct Primitive {
    name: Name,
    behavior: Behavior,
}

impl Primitive {
    /// Wrap a synchronous implementation as a value ready for `define`
    pub fn sync(name: &str, f: impl Fn(&Env, Stack) -> SlangResult<Stack> + 'static) -> Value {
        Value::Primitive(Rc::new(Primitive {
            name: Rc::from(name),
            behavior: Behavior::Sync(Rc::new(f)),
        }))
    }

    /// Wrap an asynchronous implementation as a value ready for `define`
    pub fn asynchronous(name: &str, f: impl Fn(&Env, Stack, Continuation) + 'static) -> Value {
        Value::Primitive(Rc::new(Primitive {
            name: Rc::from(name),
            behavior: Behavior::Async(Rc::new(f)),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    pub fn is_async(&self) -> bool {
        matches!(self.behavior, Behavior::Async(_))
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("async", &self.is_async())
            .finish()
    }
}

/// Vocabulary: the harvested innermost frame of a block run under `vocab`
///
/// Immutable by convention; `use` copies its bindings into a frame.
pub struct Vocab {
    bindings: Bindings,
}

impl Vocab {
    pub fn new(bindings: Bindings) -> Self {
        Vocab { bindings }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binding names in sorted order
    pub fn names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Vocab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vocab").field("names", &self.names()).finish()
    }
}

/// Object: mutable properties answered first, then the vocabulary
pub struct Object {
    props: RefCell<Bindings>,
    vocab: Rc<Vocab>,
}

impl Object {
    pub fn new(vocab: Rc<Vocab>) -> Self {
        Object {
            props: RefCell::new(Bindings::new()),
            vocab,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.props.borrow().get(key).cloned()
    }

    pub fn put(&self, key: Name, value: Value) {
        self.props.borrow_mut().insert(key, value);
    }

    pub fn vocab(&self) -> &Rc<Vocab> {
        &self.vocab
    }

    /// Resolve a message: own properties shadow the vocabulary
    pub fn lookup(&self, message: &str) -> Option<Value> {
        self.get(message)
            .or_else(|| self.vocab.get(message).cloned())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<Name> = self.props.borrow().keys().cloned().collect();
        keys.sort();
        f.debug_struct("Object")
            .field("props", &keys)
            .field("vocab", &self.vocab)
            .finish()
    }
}

// =============================================================================
// Rendering
// =============================================================================
//
// The notation matches what the reader accepts for every literal kind, so
// `show` followed by a read is a near-inverse. Opaque runtime values render
// as `<kind ...>` placeholders.

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Number(n) => write_number(f, *n),
            Value::Str(s) => write_escaped(f, s),
            Value::Word(name) => f.write_str(name),
            Value::Symbol(name) => write!(f, ":{}", name),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Block(block) => {
                f.write_str("[")?;
                for instr in block.code().iter() {
                    write!(f, " {}", instr)?;
                }
                f.write_str(" ]")
            }
            Value::Primitive(p) => write!(f, "<primitive {}>", p.name()),
            Value::Vocab(v) => write!(f, "<vocabulary {}>", v.len()),
            Value::Object(o) => write!(f, "<object {}>", o.vocab().len()),
            Value::Process(p) => write!(f, "<process {}>", p.id()),
            Value::Mailbox(m) => write!(f, "<mailbox {}>", m.len()),
            Value::Dataflow(var) => match var.value() {
                Some(v) => write!(f, "<dfvar {} = {}>", var.name(), v),
                None => write!(f, "<dfvar {}>", var.name()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_literals() {
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(-2.5).to_string(), "-2.5");
        assert_eq!(Value::string("a \"b\"\n").to_string(), "\"a \\\"b\\\"\\n\"");
        assert_eq!(Value::symbol("x").to_string(), ":x");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Nil.to_string(), "nil");
    }

    #[test]
    fn test_display_nested_block() {
        let inner = Value::block(vec![Value::word("dup"), Value::word("*")]);
        let outer = Value::block(vec![Value::Number(2.0), inner, Value::word("do")]);
        assert_eq!(outer.to_string(), "[ 2 [ dup * ] do ]");
        assert_eq!(Value::block(vec![]).to_string(), "[ ]");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::string("").is_truthy());
    }

    #[test]
    fn test_equality_by_identity_for_blocks() {
        let a = Value::block(vec![Value::Number(1.0)]);
        let b = Value::block(vec![Value::Number(1.0)]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(Value::symbol("k"), Value::symbol("k"));
        assert_ne!(Value::symbol("k"), Value::word("k"));
    }

    #[test]
    fn test_capture_is_written_once() {
        let block = Block::new(vec![Value::word("x")]);
        assert!(!block.is_instantiated());

        let mut first = Bindings::new();
        first.insert(Rc::from("x"), Value::Number(1.0));
        block.capture_with(|| first);

        let snapshot = block.capture_with(|| {
            let mut second = Bindings::new();
            second.insert(Rc::from("x"), Value::Number(2.0));
            second
        });
        assert_eq!(snapshot.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_object_lookup_prefers_properties() {
        let mut methods = Bindings::new();
        methods.insert(Rc::from("name"), Value::string("class"));
        let obj = Object::new(Rc::new(Vocab::new(methods)));

        assert_eq!(obj.lookup("name"), Some(Value::string("class")));
        obj.put(Rc::from("name"), Value::string("instance"));
        assert_eq!(obj.lookup("name"), Some(Value::string("instance")));
        assert_eq!(obj.lookup("missing"), None);
    }
}
