//! Content-model validation state machines.
//!
//! A [`ContentSpec`] is the declarative tree parsed from an `<!ELEMENT>`
//! declaration. Compiling it yields a [`ContentState`] — a mutable matcher
//! driven one child-element name at a time. `allow(name)` returns
//! `(accepted, done)`: whether the name was consumed, and whether the
//! machine could stop here. The machine owns its sub-states; there is no
//! shared mutable state between validators.

use std::fmt;

/// Occurrence indicator on a content particle: `?`, `*`, or `+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Zero or one occurrence (`?`).
    Optional,
    /// Zero or more occurrences (`*`).
    ZeroOrMore,
    /// One or more occurrences (`+`).
    OneOrMore,
}

/// The broad shape of a content model, as declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// `EMPTY` — the element must have no content at all.
    Empty,
    /// `ANY` — anything goes.
    Any,
    /// `(#PCDATA | ...)` — text freely interleaved with listed elements.
    Mixed,
    /// Element-only content following a particle grammar.
    Children,
}

/// A parsed content specification from an `<!ELEMENT>` declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSpec {
    /// `EMPTY`.
    Empty,
    /// `ANY`.
    Any,
    /// A single element name.
    Element(String),
    /// A particle with an occurrence indicator.
    Repeated(Box<ContentSpec>, Repeat),
    /// An ordered sequence `(a, b, c)`.
    Seq(Vec<ContentSpec>),
    /// A choice `(a | b | c)`; `mixed` marks `#PCDATA` interleaving.
    Choice(Vec<ContentSpec>, bool),
}

impl ContentSpec {
    /// Returns the declared content kind of this spec.
    #[must_use]
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Empty => ContentKind::Empty,
            Self::Any => ContentKind::Any,
            Self::Element(_) | Self::Seq(_) => ContentKind::Children,
            Self::Repeated(sub, _) => sub.kind(),
            Self::Choice(subs, mixed) => {
                if *mixed {
                    ContentKind::Mixed
                } else {
                    subs.first().map_or(ContentKind::Children, Self::kind)
                }
            }
        }
    }

    /// Returns `true` if this spec describes element-only content (no
    /// `#PCDATA` anywhere).
    #[must_use]
    pub fn element_content(&self) -> bool {
        match self {
            Self::Empty | Self::Any => false,
            Self::Element(_) => true,
            Self::Repeated(sub, _) => sub.element_content(),
            Self::Seq(subs) => subs.iter().all(Self::element_content),
            Self::Choice(subs, mixed) => !mixed && subs.iter().all(Self::element_content),
        }
    }

    /// Compiles this spec into a fresh matching state machine.
    #[must_use]
    pub fn compile(&self) -> ContentState {
        match self {
            Self::Empty => ContentState::Empty,
            Self::Any => ContentState::Any,
            Self::Element(name) => ContentState::Element {
                name: name.clone(),
                done: false,
            },
            Self::Repeated(sub, rep) => ContentState::Repeated {
                sub: Box::new(sub.compile()),
                rep: *rep,
                phase: Phase::Start,
            },
            Self::Seq(subs) => ContentState::Seq {
                subs: subs.iter().map(Self::compile).collect(),
                cursor: 0,
                started: false,
            },
            Self::Choice(subs, mixed) => ContentState::Choice {
                subs: subs.iter().map(Self::compile).collect(),
                mixed: *mixed,
                chosen: None,
            },
        }
    }

    /// Reference matcher: does this spec accept exactly the given sequence
    /// of child-element names? Implemented by brute-force recursion over
    /// prefixes; only suitable for tests and small inputs.
    #[must_use]
    pub fn accepts(&self, names: &[&str]) -> bool {
        self.match_lengths(names).contains(&names.len())
    }

    /// All prefix lengths of `names` this spec can consume.
    fn match_lengths(&self, names: &[&str]) -> Vec<usize> {
        match self {
            Self::Empty => vec![0],
            Self::Any => (0..=names.len()).collect(),
            Self::Element(name) => {
                if names.first() == Some(&name.as_str()) {
                    vec![1]
                } else {
                    vec![]
                }
            }
            Self::Repeated(sub, rep) => {
                let (min, max) = match rep {
                    Repeat::Optional => (0usize, 1usize),
                    Repeat::ZeroOrMore => (0, usize::MAX),
                    Repeat::OneOrMore => (1, usize::MAX),
                };
                let mut lengths = if min == 0 { vec![0] } else { vec![] };
                let mut frontier = vec![0usize];
                let mut count = 0usize;
                while !frontier.is_empty() && count < max {
                    count += 1;
                    let mut next = Vec::new();
                    for start in frontier {
                        for len in sub.match_lengths(&names[start..]) {
                            if len == 0 {
                                continue;
                            }
                            let end = start + len;
                            if !next.contains(&end) {
                                next.push(end);
                            }
                        }
                    }
                    if count >= min {
                        for &end in &next {
                            if !lengths.contains(&end) {
                                lengths.push(end);
                            }
                        }
                    }
                    frontier = next;
                }
                lengths
            }
            Self::Seq(subs) => {
                let mut frontier = vec![0usize];
                for sub in subs {
                    let mut next = Vec::new();
                    for start in frontier {
                        for len in sub.match_lengths(&names[start..]) {
                            let end = start + len;
                            if !next.contains(&end) {
                                next.push(end);
                            }
                        }
                    }
                    frontier = next;
                    if frontier.is_empty() {
                        break;
                    }
                }
                frontier
            }
            Self::Choice(subs, mixed) => {
                // Repetition in mixed content comes from the enclosing `*`
                // particle; the bare choice matches a single branch (or
                // nothing, for `#PCDATA`).
                let mut lengths: Vec<usize> = if *mixed { vec![0] } else { vec![] };
                for sub in subs {
                    for len in sub.match_lengths(names) {
                        if !lengths.contains(&len) {
                            lengths.push(len);
                        }
                    }
                }
                lengths
            }
        }
    }
}

impl fmt::Display for ContentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("EMPTY"),
            Self::Any => f.write_str("ANY"),
            Self::Element(name) => f.write_str(name),
            Self::Repeated(sub, rep) => {
                let suffix = match rep {
                    Repeat::Optional => '?',
                    Repeat::ZeroOrMore => '*',
                    Repeat::OneOrMore => '+',
                };
                write!(f, "{sub}{suffix}")
            }
            Self::Seq(subs) => {
                f.write_str("(")?;
                for (i, sub) in subs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{sub}")?;
                }
                f.write_str(")")
            }
            Self::Choice(subs, mixed) => {
                f.write_str("(")?;
                if *mixed {
                    f.write_str("#PCDATA")?;
                    for sub in subs {
                        write!(f, "|{sub}")?;
                    }
                } else {
                    for (i, sub) in subs.iter().enumerate() {
                        if i > 0 {
                            f.write_str("|")?;
                        }
                        write!(f, "{sub}")?;
                    }
                }
                f.write_str(")")
            }
        }
    }
}

/// Progress marker for the `Repeated` machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No repetition consumed yet.
    Start,
    /// Inside the first repetition.
    FirstLoop,
    /// Inside a later repetition.
    NextLoop,
}

/// A compiled, mutable content-model matcher.
///
/// Drive it with [`allow`](ContentState::allow) once per child element, in
/// document order. The tuple result is `(accepted, done)`.
#[derive(Debug, Clone)]
pub enum ContentState {
    /// Always accepts, always done.
    Any,
    /// Never accepts, always done.
    Empty,
    /// Accepts exactly one occurrence of the named element.
    Element {
        /// Name to match.
        name: String,
        /// Whether the single occurrence has been consumed.
        done: bool,
    },
    /// Drives a sub-machine with an occurrence indicator, resetting it
    /// between repetitions as permitted.
    Repeated {
        /// The sub-machine.
        sub: Box<ContentState>,
        /// The occurrence indicator.
        rep: Repeat,
        /// Progress through the repetition loop.
        phase: Phase,
    },
    /// Advances through sub-machines in order; each must finish before the
    /// next may consume.
    Seq {
        /// The sub-machines, in declaration order.
        subs: Vec<ContentState>,
        /// Index of the sub-machine currently consuming.
        cursor: usize,
        /// Whether any input has been routed yet.
        started: bool,
    },
    /// Locks to the first accepting branch.
    Choice {
        /// The alternative sub-machines.
        subs: Vec<ContentState>,
        /// `#PCDATA` interleaving is permitted.
        mixed: bool,
        /// The branch that accepted first, once locked.
        chosen: Option<usize>,
    },
}

impl ContentState {
    /// Offers the next child-element name to the machine.
    ///
    /// Returns `(accepted, done)`: whether the name was consumed here, and
    /// whether the machine has reached a state where the content may end.
    pub fn allow(&mut self, name: &str) -> (bool, bool) {
        match self {
            Self::Any => (true, true),
            Self::Empty => (false, true),
            Self::Element {
                name: expected,
                done,
            } => {
                if !*done && expected == name {
                    *done = true;
                    (true, true)
                } else {
                    (false, *done)
                }
            }
            Self::Repeated { sub, rep, phase } => match rep {
                Repeat::Optional => {
                    let (result, mut done) = sub.allow(name);
                    if *phase == Phase::Start {
                        if result {
                            *phase = Phase::FirstLoop;
                        } else {
                            done = true;
                        }
                    }
                    (result, done)
                }
                Repeat::ZeroOrMore => match phase {
                    Phase::Start => {
                        let (result, mut done) = sub.allow(name);
                        if result {
                            *phase = Phase::FirstLoop;
                        } else {
                            done = true;
                        }
                        (result, done)
                    }
                    _ => {
                        let (mut result, mut done) = sub.allow(name);
                        if !result && done {
                            sub.reset();
                            let (r2, d2) = sub.allow(name);
                            result = r2;
                            done = d2;
                            if !result {
                                done = true;
                            }
                        }
                        (result, done)
                    }
                },
                Repeat::OneOrMore => match phase {
                    Phase::Start => {
                        let (result, done) = sub.allow(name);
                        if result {
                            *phase = Phase::FirstLoop;
                        }
                        (result, done)
                    }
                    Phase::FirstLoop => {
                        let (mut result, mut done) = sub.allow(name);
                        if !result && done {
                            sub.reset();
                            let (r2, d2) = sub.allow(name);
                            result = r2;
                            done = d2;
                            if result {
                                *phase = Phase::NextLoop;
                            }
                        }
                        (result, done)
                    }
                    Phase::NextLoop => {
                        let (mut result, mut done) = sub.allow(name);
                        if !result && done {
                            sub.reset();
                            let (r2, d2) = sub.allow(name);
                            result = r2;
                            done = d2;
                            if !result {
                                done = true;
                            }
                        }
                        (result, done)
                    }
                },
            },
            Self::Seq {
                subs,
                cursor,
                started,
            } => {
                if !*started {
                    *started = true;
                    *cursor = 0;
                }
                if subs.is_empty() {
                    return (false, true);
                }
                loop {
                    if *cursor >= subs.len() {
                        return (false, true);
                    }
                    let (result, done) = subs[*cursor].allow(name);
                    if result {
                        // Done only if this sub may end here and everything
                        // after it can match empty.
                        let rest_empty =
                            subs[*cursor + 1..].iter().all(ContentState::allow_empty);
                        return (true, done && rest_empty);
                    }
                    if done {
                        *cursor += 1;
                        continue;
                    }
                    return (false, false);
                }
            }
            Self::Choice {
                subs,
                mixed: _,
                chosen,
            } => {
                if let Some(index) = chosen {
                    return subs[*index].allow(name);
                }
                for (index, sub) in subs.iter_mut().enumerate() {
                    let (result, done) = sub.allow(name);
                    if result {
                        *chosen = Some(index);
                        return (result, done);
                    }
                }
                (false, false)
            }
        }
    }

    /// Whether character data is permitted in this content model.
    #[must_use]
    pub fn allow_char_data(&self) -> bool {
        match self {
            Self::Any => true,
            Self::Empty | Self::Element { .. } => false,
            Self::Repeated { sub, .. } => sub.allow_char_data(),
            Self::Seq { subs, .. } => subs.iter().any(Self::allow_char_data),
            Self::Choice { mixed, .. } => *mixed,
        }
    }

    /// Whether this machine accepts the empty sequence from its initial
    /// state.
    #[must_use]
    pub fn allow_empty(&self) -> bool {
        match self {
            Self::Any | Self::Empty => true,
            Self::Element { .. } => false,
            Self::Repeated { sub, rep, .. } => match rep {
                Repeat::Optional | Repeat::ZeroOrMore => true,
                Repeat::OneOrMore => sub.allow_empty(),
            },
            Self::Seq { subs, .. } => subs.iter().all(Self::allow_empty),
            Self::Choice { subs, mixed, .. } => *mixed || subs.iter().any(Self::allow_empty),
        }
    }

    /// Whether the model requires the element to be completely empty.
    #[must_use]
    pub fn must_be_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Rewinds the machine to its initial state.
    pub fn reset(&mut self) {
        match self {
            Self::Any | Self::Empty => {}
            Self::Element { done, .. } => *done = false,
            Self::Repeated { sub, phase, .. } => {
                sub.reset();
                *phase = Phase::Start;
            }
            Self::Seq {
                subs,
                cursor,
                started,
            } => {
                for sub in subs {
                    sub.reset();
                }
                *cursor = 0;
                *started = false;
            }
            Self::Choice { subs, chosen, .. } => {
                for sub in subs {
                    sub.reset();
                }
                *chosen = None;
            }
        }
    }
}

/// Drives a compiled content model for one element's children.
///
/// Tracks the running `done` flag so the parser can ask, at the end tag,
/// whether the content sequence was complete.
#[derive(Debug)]
pub struct Validator {
    state: ContentState,
    kind: ContentKind,
    done: bool,
}

impl Validator {
    /// Creates a validator for the given spec. `None` (no declaration for
    /// the element) validates as `ANY`.
    #[must_use]
    pub fn new(spec: Option<&ContentSpec>) -> Self {
        match spec {
            Some(spec) => {
                let state = spec.compile();
                let done = state.allow_empty();
                Self {
                    state,
                    kind: spec.kind(),
                    done,
                }
            }
            None => Self {
                state: ContentState::Any,
                kind: ContentKind::Any,
                done: true,
            },
        }
    }

    /// Offers the next child-element name. Returns whether it is allowed.
    pub fn allow(&mut self, name: &str) -> bool {
        let (result, done) = self.state.allow(name);
        self.done = done;
        result
    }

    /// Whether the content consumed so far forms a complete match.
    #[must_use]
    pub fn done(&self) -> bool {
        self.done
    }

    /// Whether character data is permitted.
    #[must_use]
    pub fn allow_char_data(&self) -> bool {
        self.state.allow_char_data()
    }

    /// Whether the element was declared `EMPTY`.
    #[must_use]
    pub fn must_be_empty(&self) -> bool {
        self.state.must_be_empty()
    }

    /// The declared content kind.
    #[must_use]
    pub fn content_kind(&self) -> ContentKind {
        self.kind
    }
}
