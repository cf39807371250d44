//! Schema-derived grammar tables and the EXI event productions they imply.
//!
//! A [`ComplexType`] lists its attributes (sorted by name) followed by its content
//! particles in schema order. Together these form the *steps* of the type. The
//! encoder and decoder share one [`GrammarState`] walk over the steps so the event
//! codes they use can never disagree.

/// Number of bits needed to encode `n` distinct values.
pub fn bits_for(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    pub min: u32,
    pub max: MaxOccurs,
}

impl Occurs {
    pub const ONE: Occurs = Occurs { min: 1, max: MaxOccurs::Bounded(1) };
    pub const OPTIONAL: Occurs = Occurs { min: 0, max: MaxOccurs::Bounded(1) };
    pub const ANY: Occurs = Occurs { min: 0, max: MaxOccurs::Unbounded };

    pub const fn range(min: u32, max: u32) -> Occurs {
        Occurs { min, max: MaxOccurs::Bounded(max) }
    }

    pub const fn at_least(min: u32) -> Occurs {
        Occurs { min, max: MaxOccurs::Unbounded }
    }

    /// Whether another occurrence may follow `count` existing ones.
    pub fn allows(&self, count: u32) -> bool {
        match self.max {
            MaxOccurs::Bounded(max) => count < max,
            MaxOccurs::Unbounded => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryEncoding {
    Hex,
    Base64,
}

/// Simple (leaf) datatypes and their EXI representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleType {
    Boolean,
    /// Range of at most 4096 values: `value - min` as an n-bit integer.
    Bounded { min: i64, max: i64 },
    /// Non-negative: EXI unsigned integer.
    Unsigned,
    /// Sign bit followed by the magnitude as an EXI unsigned integer.
    Signed,
    /// Schema ordering of the enumerated names.
    Enumeration(&'static [&'static str]),
    /// `max_len` is in characters. A restricted `charset` packs each character
    /// as an index into it.
    String { max_len: usize, charset: Option<&'static str> },
    Binary { max_len: usize, encoding: BinaryEncoding },
}

impl SimpleType {
    pub const UNSIGNED_BYTE: SimpleType = SimpleType::Bounded { min: 0, max: 255 };
    pub const UNSIGNED_INT: SimpleType = SimpleType::Unsigned;
    pub const UNSIGNED_LONG: SimpleType = SimpleType::Unsigned;
    pub const INTEGER: SimpleType = SimpleType::Signed;

    /// Pick the integer representation for an inclusive `min..=max` facet.
    pub const fn ranged(min: i64, max: i64) -> SimpleType {
        if (max as i128) - (min as i128) < 4096 {
            SimpleType::Bounded { min, max }
        } else if min >= 0 {
            SimpleType::Unsigned
        } else {
            SimpleType::Signed
        }
    }

    pub const fn string(max_len: usize) -> SimpleType {
        SimpleType::String { max_len, charset: None }
    }

    pub const fn hex(max_len: usize) -> SimpleType {
        SimpleType::Binary { max_len, encoding: BinaryEncoding::Hex }
    }

    pub const fn base64(max_len: usize) -> SimpleType {
        SimpleType::Binary { max_len, encoding: BinaryEncoding::Base64 }
    }
}

/// What a particle contains.
#[derive(Debug, Clone, Copy)]
pub enum Term {
    Simple(SimpleType),
    Complex(&'static ComplexType),
    /// Declared by the schema but not modelled; must be absent.
    Opaque,
    /// `xs:any`, encoded as `SE(*)`. Never produced; rejected on decode.
    Wildcard,
}

#[derive(Debug, Clone, Copy)]
pub struct Attribute {
    pub name: &'static str,
    pub ty: SimpleType,
    pub required: bool,
}

impl Attribute {
    pub const fn required(name: &'static str, ty: SimpleType) -> Attribute {
        Attribute { name, ty, required: true }
    }

    pub const fn optional(name: &'static str, ty: SimpleType) -> Attribute {
        Attribute { name, ty, required: false }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub name: &'static str,
    pub term: Term,
    pub occurs: Occurs,
}

impl Particle {
    pub const fn new(name: &'static str, term: Term, occurs: Occurs) -> Particle {
        Particle { name, term, occurs }
    }

    pub const fn one(name: &'static str, term: Term) -> Particle {
        Particle::new(name, term, Occurs::ONE)
    }

    pub const fn optional(name: &'static str, term: Term) -> Particle {
        Particle::new(name, term, Occurs::OPTIONAL)
    }

    pub const fn any() -> Particle {
        Particle::new("*", Term::Wildcard, Occurs::ANY)
    }
}

#[derive(Debug)]
pub struct ComplexType {
    pub name: &'static str,
    pub attributes: &'static [Attribute],
    pub particles: &'static [Particle],
    pub mixed: bool,
}

/// Uniform view of an attribute or a particle.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub name: &'static str,
    pub term: Term,
    pub occurs: Occurs,
    pub is_attribute: bool,
}

impl ComplexType {
    pub fn step_count(&self) -> usize {
        self.attributes.len() + self.particles.len()
    }

    pub fn step(&self, index: usize) -> Option<Step> {
        if let Some(a) = self.attributes.get(index) {
            return Some(Step {
                name: a.name,
                term: Term::Simple(a.ty),
                occurs: if a.required { Occurs::ONE } else { Occurs::OPTIONAL },
                is_attribute: true,
            });
        }
        self.particles.get(index - self.attributes.len()).map(|p| Step {
            name: p.name,
            term: p.term,
            occurs: p.occurs,
            is_attribute: false,
        })
    }
}

/// An event of an element grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// `AT` or `SE` for the given step.
    Step(usize),
    EndElement,
    Characters,
}

/// Position inside an element grammar: the step last emitted and how often.
#[derive(Debug, Clone, Copy)]
pub struct GrammarState {
    ty: &'static ComplexType,
    index: usize,
    count: u32,
}

impl GrammarState {
    pub fn start(ty: &'static ComplexType) -> Self {
        GrammarState { ty, index: 0, count: 0 }
    }

    pub fn complex_type(&self) -> &'static ComplexType {
        self.ty
    }

    /// Productions in event-code order.
    pub fn productions(&self) -> Productions {
        Productions {
            ty: self.ty,
            index: self.index,
            count: self.count,
            next: self.index,
            phase: Phase::Steps,
        }
    }

    /// Bits of an event code in this state. The extra slot is the escape to the
    /// undeclared second level.
    pub fn width(&self) -> u32 {
        bits_for(self.productions().count() + 1)
    }

    pub fn code_of(&self, event: Event) -> Option<usize> {
        self.productions().position(|e| e == event)
    }

    pub fn event_at(&self, code: usize) -> Option<Event> {
        self.productions().nth(code)
    }

    /// How many occurrences of `step` were already emitted.
    pub fn occurrence(&self, step: usize) -> u32 {
        if step == self.index {
            self.count
        } else {
            0
        }
    }

    pub fn advance(&mut self, step: usize) {
        self.count = self.occurrence(step) + 1;
        self.index = step;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Steps,
    End,
    Characters,
    Done,
}

/// Lazy iterator over the productions of a [`GrammarState`].
#[derive(Debug, Clone)]
pub struct Productions {
    ty: &'static ComplexType,
    index: usize,
    count: u32,
    next: usize,
    phase: Phase,
}

impl Iterator for Productions {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            match self.phase {
                Phase::Steps => {
                    let Some(step) = self.ty.step(self.next) else {
                        self.phase = Phase::End;
                        continue;
                    };
                    let i = self.next;
                    let count = if i == self.index { self.count } else { 0 };
                    self.next += 1;
                    if count < step.occurs.min {
                        // Mandatory step: nothing after it is reachable yet.
                        self.phase = if step.is_attribute {
                            Phase::Done
                        } else {
                            Phase::Characters
                        };
                        return Some(Event::Step(i));
                    }
                    if step.occurs.allows(count) {
                        return Some(Event::Step(i));
                    }
                }
                Phase::End => {
                    self.phase = Phase::Characters;
                    return Some(Event::EndElement);
                }
                Phase::Characters => {
                    self.phase = Phase::Done;
                    if self.ty.mixed {
                        return Some(Event::Characters);
                    }
                }
                Phase::Done => return None,
            }
        }
    }
}

/// Whether a root table describes a whole document or a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Document,
    Fragment,
}

/// Global element declaration. `ty` is `None` for elements that are declared
/// but not modelled by this crate.
#[derive(Debug, Clone, Copy)]
pub struct RootElement {
    pub name: &'static str,
    pub ty: Option<&'static ComplexType>,
}

impl RootElement {
    pub const fn modelled(name: &'static str, ty: &'static ComplexType) -> RootElement {
        RootElement { name, ty: Some(ty) }
    }

    pub const fn declared(name: &'static str) -> RootElement {
        RootElement { name, ty: None }
    }
}

/// Root table of a message family: global elements sorted by local name.
#[derive(Debug)]
pub struct DocumentGrammar {
    pub name: &'static str,
    pub namespace: &'static str,
    pub kind: RootKind,
    pub roots: &'static [RootElement],
}

impl DocumentGrammar {
    /// Code of `SE(*)`, one past the declared roots.
    pub fn wildcard_code(&self) -> usize {
        self.roots.len()
    }

    /// Code of `ED` in fragment content.
    pub fn end_code(&self) -> usize {
        self.roots.len() + 1
    }

    pub fn root_width(&self) -> u32 {
        match self.kind {
            RootKind::Document => bits_for(self.roots.len() + 1),
            RootKind::Fragment => bits_for(self.roots.len() + 2),
        }
    }

    pub fn root_index(&self, name: &str) -> Option<usize> {
        self.roots.iter().position(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static LEAF: ComplexType = ComplexType {
        name: "Leaf",
        attributes: &[
            Attribute::optional("Id", SimpleType::string(8)),
            Attribute::required("Algorithm", SimpleType::string(8)),
        ],
        particles: &[Particle::any()],
        mixed: true,
    };

    static LIST: ComplexType = ComplexType {
        name: "List",
        attributes: &[],
        particles: &[
            Particle::new("Item", Term::Simple(SimpleType::Boolean), Occurs::range(1, 2)),
            Particle::optional("Note", Term::Simple(SimpleType::Boolean)),
            Particle::one("Tail", Term::Simple(SimpleType::Boolean)),
        ],
        mixed: false,
    };

    fn events(state: &GrammarState) -> Vec<Event> {
        state.productions().collect()
    }

    #[test]
    fn bit_widths() {
        assert_eq!(bits_for(0), 0);
        assert_eq!(bits_for(1), 0);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(20), 5);
        assert_eq!(bits_for(40), 6);
        assert_eq!(bits_for(47), 6);
        assert_eq!(bits_for(256), 8);
    }

    #[test]
    fn required_attribute_blocks_content() {
        let mut s = GrammarState::start(&LEAF);
        assert_eq!(events(&s), vec![Event::Step(0), Event::Step(1)]);
        assert_eq!(s.width(), 2);
        s.advance(1);
        assert_eq!(
            events(&s),
            vec![Event::Step(2), Event::EndElement, Event::Characters]
        );
        assert_eq!(s.code_of(Event::EndElement), Some(1));
        assert_eq!(s.width(), 2);
    }

    #[test]
    fn bounded_repeat() {
        let mut s = GrammarState::start(&LIST);
        assert_eq!(events(&s), vec![Event::Step(0)]);
        assert_eq!(s.width(), 1);
        s.advance(0);
        assert_eq!(events(&s), vec![Event::Step(0), Event::Step(1), Event::Step(2)]);
        s.advance(0);
        assert_eq!(s.occurrence(0), 2);
        assert_eq!(events(&s), vec![Event::Step(1), Event::Step(2)]);
        s.advance(2);
        assert_eq!(events(&s), vec![Event::EndElement]);
        assert_eq!(s.event_at(1), None);
    }

    #[test]
    fn ranged_integers() {
        assert_eq!(SimpleType::ranged(1, 20), SimpleType::Bounded { min: 1, max: 20 });
        assert_eq!(SimpleType::ranged(0, 1 << 20), SimpleType::Unsigned);
        assert_eq!(SimpleType::ranged(-1 << 20, 0), SimpleType::Signed);
    }
}
