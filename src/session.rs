/// Session controller — the state machine behind one exploration session.
///
/// Owns the course cache and the history stack, and serializes user actions
/// (start, branch, deepen, back) into at most one in-flight generation.
///
/// Actions are dispatched in two phases so the caller stays in control of
/// the network side (the TUI spawns the request on a task, the single-shot
/// path awaits it inline):
///
///   controller.start("topic")      → Dispatch::Ready   (cache hit, done)
///                                  → Dispatch::Fetch(r) (run the generation,
///                                      then controller.resolve(r.ticket, result))
///                                  → Dispatch::Ignored (already loading)
///
/// Every issued request carries a monotonic ticket. `back()` and
/// supersession bump the controller's ticket, so a stale resolution arriving
/// afterwards is discarded instead of clobbering newer state. `back()` is
/// always synchronous and never touches the network.
use std::sync::Arc;

use crate::cache::CourseCache;
use crate::client::INVALID_CONTENT;
use crate::course::{Choice, Course, Selection, topic_key};
use crate::history::{HistoryNode, HistoryStack};

// ── Phase ─────────────────────────────────────────────────────────────────────

/// Session display state. History length ≥ 1 whenever Ready; Errored holds
/// an empty stack after a failed start, the pre-failure stack otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No content yet
    Idle,
    /// A generation request is outstanding
    Loading,
    /// A current course is displayed
    Ready,
    /// The last action failed
    Errored,
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Which action issued the in-flight request. Drives what happens on
/// resolution: history reset vs annotate+push, and whether a failure
/// discards the displayed content.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RequestOrigin {
    Start,
    Branch { choice_key: String },
    Deepen,
}

/// A cache miss handed to the caller: run the generation for `prompt`
/// (single attempt), then call `resolve(ticket, result)`.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub ticket: u64,
    pub prompt: String,
}

#[derive(Debug)]
pub enum Dispatch {
    /// Cache hit — applied synchronously; the controller is already Ready.
    Ready,
    /// Cache miss — the controller is now Loading until `resolve` is called
    /// with this request's ticket.
    Fetch(PendingRequest),
    /// A generation is already in flight (or the action has no valid
    /// context); nothing changed.
    Ignored,
}

struct InFlight {
    key: String,
    prompt: String,
    origin: RequestOrigin,
}

// ── Deepen prompt ─────────────────────────────────────────────────────────────

const DEEPEN_INSTRUCTION: &str =
    "Focus on advanced concepts, technical detail, caveats, and state-of-the-art.";

// ── Controller ────────────────────────────────────────────────────────────────

pub struct SessionController {
    cache: CourseCache,
    history: HistoryStack,
    phase: Phase,
    error: Option<String>,
    /// Prompt from the most recent start() — deepen fallback when the
    /// current node has no usable title or prompt
    start_prompt: Option<String>,
    /// Last-resort deepen base when there is no history at all
    default_topic: String,
    /// Monotonic request ticket; bumped at issue and on back()
    ticket: u64,
    /// Some iff phase == Loading
    in_flight: Option<InFlight>,
}

impl SessionController {
    pub fn new(default_topic: impl Into<String>) -> Self {
        Self {
            cache: CourseCache::default(),
            history: HistoryStack::default(),
            phase: Phase::Idle,
            error: None,
            start_prompt: None,
            default_topic: default_topic.into(),
            ticket: 0,
            in_flight: None,
        }
    }

    // ── State accessors ───────────────────────────────────────────────────────

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The current node (top of the history stack).
    pub fn current(&self) -> Option<&HistoryNode> {
        self.history.top()
    }

    pub fn current_course(&self) -> Option<&Arc<Course>> {
        self.history.top().map(|n| &n.course)
    }

    /// Action previously taken from the current node — what the UI
    /// re-highlights after back().
    pub fn top_selection(&self) -> Option<&Selection> {
        self.history.top().and_then(|n| n.selected.as_ref())
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn can_go_back(&self) -> bool {
        self.history.len() > 1
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn cache(&self) -> &CourseCache {
        &self.cache
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    /// Begin a fresh exploration from a user-supplied topic. Always resets
    /// history — even when content is already displayed, a new start
    /// discards the previous tree entirely (its content stays cached).
    pub fn start(&mut self, prompt: &str) -> Dispatch {
        if self.is_loading() {
            return Dispatch::Ignored;
        }
        self.start_prompt = Some(prompt.to_string());

        let key = topic_key(prompt);
        if let Some(course) = self.cache.get(&key) {
            self.history.reset(HistoryNode::new(key, prompt.to_string(), course));
            self.error = None;
            self.phase = Phase::Ready;
            return Dispatch::Ready;
        }
        self.issue(key, prompt.to_string(), RequestOrigin::Start)
    }

    /// Descend into one of the current course's branch choices.
    pub fn select_branch(&mut self, choice: &Choice) -> Dispatch {
        if self.is_loading() || self.history.is_empty() {
            return Dispatch::Ignored;
        }

        let key = topic_key(&choice.text);
        if let Some(course) = self.cache.get(&key) {
            // Child content exists — safe to record the parent's selection,
            // then descend. Instant, no loading flicker.
            self.history.annotate_top(Selection::Branch(choice.key.clone()));
            self.history.push(HistoryNode::new(key, choice.text.clone(), course));
            self.error = None;
            self.phase = Phase::Ready;
            return Dispatch::Ready;
        }
        self.issue(
            key,
            choice.text.clone(),
            RequestOrigin::Branch { choice_key: choice.key.clone() },
        )
    }

    /// Request a deeper elaboration of the current topic. The derived
    /// prompt is its own node: deepening twice from the same place is a
    /// cache hit the second time.
    pub fn deepen(&mut self) -> Dispatch {
        if self.is_loading() {
            return Dispatch::Ignored;
        }

        let prompt = self.deepen_prompt();
        let key = topic_key(&prompt);
        if let Some(course) = self.cache.get(&key) {
            self.history.annotate_top(Selection::Deeper);
            self.history.push(HistoryNode::new(key, prompt, course));
            self.error = None;
            self.phase = Phase::Ready;
            return Dispatch::Ready;
        }
        self.issue(key, prompt, RequestOrigin::Deepen)
    }

    /// Step back to the parent node. Synchronous — never touches the
    /// network or the Loading state. No-op at the root (or with no
    /// history). Clears any error and orphans any in-flight request, so a
    /// late resolution cannot overwrite the restored state.
    pub fn back(&mut self) -> bool {
        if self.history.len() <= 1 {
            return false;
        }
        self.ticket += 1;
        self.in_flight = None;
        self.history.pop_to_parent();
        self.error = None;
        self.phase = Phase::Ready;
        true
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    /// Apply the outcome of a previously issued request. Results whose
    /// ticket no longer matches the controller's (superseded by `back()`)
    /// are discarded. Returns true if the result was applied.
    pub fn resolve(&mut self, ticket: u64, result: Result<Course, String>) -> bool {
        if ticket != self.ticket || self.phase != Phase::Loading {
            return false;
        }
        let Some(InFlight { key, prompt, origin }) = self.in_flight.take() else {
            return false;
        };

        match result {
            Ok(course) => {
                let course = Arc::new(course);
                self.cache.insert(&key, course.clone());
                match &origin {
                    RequestOrigin::Start => {
                        self.history.reset(HistoryNode::new(key, prompt, course));
                    }
                    RequestOrigin::Branch { choice_key } => {
                        // The parent's selection is recorded only now that
                        // the child's content actually exists.
                        self.history.annotate_top(Selection::Branch(choice_key.clone()));
                        self.history.push(HistoryNode::new(key, prompt, course));
                    }
                    RequestOrigin::Deepen => {
                        self.history.annotate_top(Selection::Deeper);
                        self.history.push(HistoryNode::new(key, prompt, course));
                    }
                }
                self.error = None;
                self.phase = Phase::Ready;
            }
            Err(message) => {
                // A failed start discards displayed content entirely; a
                // failed branch/deepen keeps the user's place and only
                // overlays the error message.
                if origin == RequestOrigin::Start {
                    self.history.clear();
                }
                self.error = Some(failure_message(&origin, &message));
                self.phase = Phase::Errored;
            }
        }
        true
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn issue(&mut self, key: String, prompt: String, origin: RequestOrigin) -> Dispatch {
        self.ticket += 1;
        self.error = None;
        self.phase = Phase::Loading;
        self.in_flight = Some(InFlight { key, prompt: prompt.clone(), origin });
        Dispatch::Fetch(PendingRequest { ticket: self.ticket, prompt })
    }

    /// Base for the deepen prompt: current course title, else the current
    /// node's prompt, else the original start prompt, else the configured
    /// default topic.
    fn deepen_prompt(&self) -> String {
        let top = self.history.top();
        let base = top
            .map(|n| n.course.course_title.as_str())
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                top.map(|n| n.prompt.as_str()).filter(|p| !p.trim().is_empty())
            })
            .or_else(|| {
                self.start_prompt.as_deref().filter(|p| !p.trim().is_empty())
            })
            .unwrap_or(&self.default_topic);
        format!("Go deeper on: {base}. {DEEPEN_INSTRUCTION}")
    }
}

/// Surface the collaborator's message when it is human-readable; the
/// rejected-content sentinel and empty messages fall back to a generic
/// per-action text.
fn failure_message(origin: &RequestOrigin, message: &str) -> String {
    let message = message.trim();
    if !message.is_empty() && message != INVALID_CONTENT {
        return message.to_string();
    }
    match origin {
        RequestOrigin::Start => "Something went wrong generating the course.",
        RequestOrigin::Branch { .. } => "Something went wrong generating the branch.",
        RequestOrigin::Deepen => "Something went wrong generating the deeper dive.",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::Section;

    fn course(title: &str) -> Course {
        Course {
            course_title: title.to_string(),
            sections: vec![Section {
                heading: format!("{title} — overview"),
                paragraphs: vec!["A paragraph.".to_string()],
            }],
            choices: vec![
                Choice { key: "1".to_string(), text: "Bell's theorem".to_string() },
                Choice { key: "2".to_string(), text: "EPR paradox".to_string() },
            ],
        }
    }

    fn fetch(d: Dispatch) -> PendingRequest {
        match d {
            Dispatch::Fetch(req) => req,
            other => panic!("expected Fetch, got {other:?}"),
        }
    }

    /// Drive a start() to Ready through the miss path.
    fn started(ctl: &mut SessionController, prompt: &str, title: &str) {
        let req = fetch(ctl.start(prompt));
        assert!(ctl.resolve(req.ticket, Ok(course(title))));
        assert_eq!(*ctl.phase(), Phase::Ready);
    }

    #[test]
    fn start_miss_loads_then_ready() {
        let mut ctl = SessionController::new("Quantum computing");
        let req = fetch(ctl.start("Quantum entanglement"));
        assert!(ctl.is_loading());
        assert_eq!(req.prompt, "Quantum entanglement");

        assert!(ctl.resolve(req.ticket, Ok(course("Quantum Entanglement"))));
        assert_eq!(*ctl.phase(), Phase::Ready);
        assert_eq!(ctl.depth(), 1);

        let node = ctl.current().unwrap();
        assert_eq!(node.key, "quantum entanglement");
        assert_eq!(node.selected, None);
        assert_eq!(node.course.course_title, "Quantum Entanglement");
    }

    #[test]
    fn start_is_idempotent_across_case_and_whitespace() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "Quantum entanglement", "Quantum Entanglement");
        let first = ctl.current_course().unwrap().clone();

        // Same topic modulo normalization: synchronous, no second fetch,
        // identical cached instance.
        match ctl.start("  QUANTUM ENTANGLEMENT ") {
            Dispatch::Ready => {}
            other => panic!("expected cache hit, got {other:?}"),
        }
        assert_eq!(*ctl.phase(), Phase::Ready);
        assert!(Arc::ptr_eq(ctl.current_course().unwrap(), &first));
        assert_eq!(ctl.cache().len(), 1);
    }

    #[test]
    fn fresh_start_resets_history_even_over_existing_content() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "qubits", "Qubits");
        let choice = ctl.current_course().unwrap().choices[0].clone();
        let req = fetch(ctl.select_branch(&choice));
        ctl.resolve(req.ticket, Ok(course("Bell's Theorem")));
        assert_eq!(ctl.depth(), 2);

        started(&mut ctl, "quantum gates", "Quantum Gates");
        assert_eq!(ctl.depth(), 1);
        assert_eq!(ctl.current().unwrap().key, "quantum gates");
    }

    #[test]
    fn start_failure_clears_displayed_content() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "qubits", "Qubits");

        let req = fetch(ctl.start("superdense coding"));
        assert!(ctl.resolve(req.ticket, Err("API error 500: upstream".to_string())));
        assert_eq!(*ctl.phase(), Phase::Errored);
        assert_eq!(ctl.error(), Some("API error 500: upstream"));
        // Unlike branch/deepen failures, the previous tree is discarded
        assert_eq!(ctl.depth(), 0);
        assert!(ctl.current().is_none());
    }

    #[test]
    fn branch_miss_annotates_parent_only_on_success() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "Quantum entanglement", "Quantum Entanglement");
        let choice = Choice { key: "1".to_string(), text: "Bell's theorem".to_string() };

        let req = fetch(ctl.select_branch(&choice));
        // Not annotated speculatively while the request is outstanding
        assert_eq!(ctl.history().nodes()[0].selected, None);

        assert!(ctl.resolve(req.ticket, Ok(course("Bell's Theorem"))));
        let nodes = ctl.history().nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].selected, Some(Selection::Branch("1".to_string())));
        assert_eq!(nodes[1].selected, None);
        assert_eq!(nodes[1].key, "bell's theorem");
    }

    #[test]
    fn branch_failure_preserves_history_and_annotation() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "Quantum entanglement", "Quantum Entanglement");
        let choice = Choice { key: "2".to_string(), text: "EPR paradox".to_string() };

        let req = fetch(ctl.select_branch(&choice));
        assert!(ctl.resolve(req.ticket, Err("connection refused".to_string())));

        assert_eq!(*ctl.phase(), Phase::Errored);
        assert_eq!(ctl.error(), Some("connection refused"));
        // The user keeps their place: stack and annotation untouched
        assert_eq!(ctl.depth(), 1);
        assert_eq!(ctl.current().unwrap().selected, None);
        assert_eq!(ctl.current().unwrap().key, "quantum entanglement");
    }

    #[test]
    fn cached_branch_is_synchronous_and_reuses_the_instance() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "Quantum entanglement", "Quantum Entanglement");
        let choice = Choice { key: "1".to_string(), text: "Bell's theorem".to_string() };

        // First visit: network round-trip
        let req = fetch(ctl.select_branch(&choice));
        ctl.resolve(req.ticket, Ok(course("Bell's Theorem")));
        let first_visit = ctl.current_course().unwrap().clone();

        // Back, then re-select: instant, annotated, same Arc
        assert!(ctl.back());
        match ctl.select_branch(&choice) {
            Dispatch::Ready => {}
            other => panic!("expected cache hit, got {other:?}"),
        }
        assert_eq!(*ctl.phase(), Phase::Ready);
        assert!(Arc::ptr_eq(ctl.current_course().unwrap(), &first_visit));
        assert_eq!(
            ctl.history().nodes()[0].selected,
            Some(Selection::Branch("1".to_string()))
        );
    }

    #[test]
    fn deepen_derives_prompt_from_current_title() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "qubits", "Qubits and Superposition");

        let req = fetch(ctl.deepen());
        assert_eq!(
            req.prompt,
            "Go deeper on: Qubits and Superposition. Focus on advanced concepts, \
             technical detail, caveats, and state-of-the-art."
        );

        ctl.resolve(req.ticket, Ok(course("Qubits, Deeper")));
        let nodes = ctl.history().nodes();
        assert_eq!(nodes[0].selected, Some(Selection::Deeper));
        assert_eq!(nodes[1].selected, None);
    }

    #[test]
    fn deepen_falls_back_to_prompt_then_start_then_default() {
        // Empty course title → falls back to the node's own prompt
        let mut ctl = SessionController::new("Quantum computing");
        let req = fetch(ctl.start("grover search"));
        ctl.resolve(req.ticket, Ok(Course {
            course_title: "  ".to_string(),
            sections: vec![],
            choices: vec![],
        }));
        let req = fetch(ctl.deepen());
        assert!(req.prompt.starts_with("Go deeper on: grover search."));

        // No history at all → configured default topic
        let mut fresh = SessionController::new("Quantum computing");
        let req = fetch(fresh.deepen());
        assert!(req.prompt.starts_with("Go deeper on: Quantum computing."));
    }

    #[test]
    fn deepen_sentinel_failure_surfaces_generic_message() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "qubits", "Qubits");
        let before: Vec<String> =
            ctl.history().nodes().iter().map(|n| n.key.clone()).collect();

        let req = fetch(ctl.deepen());
        assert!(ctl.resolve(req.ticket, Err("Not Valid Content".to_string())));

        assert_eq!(*ctl.phase(), Phase::Errored);
        assert_eq!(ctl.error(), Some("Something went wrong generating the deeper dive."));
        let after: Vec<String> =
            ctl.history().nodes().iter().map(|n| n.key.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(ctl.current().unwrap().selected, None);
    }

    #[test]
    fn single_flight_ignores_actions_while_loading() {
        let mut ctl = SessionController::new("Quantum computing");
        let req = fetch(ctl.start("qubits"));

        assert!(matches!(ctl.start("something else"), Dispatch::Ignored));
        assert!(matches!(ctl.deepen(), Dispatch::Ignored));
        let choice = Choice { key: "1".to_string(), text: "x".to_string() };
        assert!(matches!(ctl.select_branch(&choice), Dispatch::Ignored));

        // The original request still resolves coherently
        assert!(ctl.resolve(req.ticket, Ok(course("Qubits"))));
        assert_eq!(ctl.depth(), 1);
        assert_eq!(ctl.current().unwrap().key, "qubits");
    }

    #[test]
    fn back_walks_to_root_and_stops() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "Quantum entanglement", "Quantum Entanglement");
        let root_course = ctl.current_course().unwrap().clone();

        for text in ["Bell's theorem", "CHSH inequality", "Loophole-free tests"] {
            let choice = Choice { key: "1".to_string(), text: text.to_string() };
            let req = fetch(ctl.select_branch(&choice));
            ctl.resolve(req.ticket, Ok(course(text)));
        }
        assert_eq!(ctl.depth(), 4);

        assert!(ctl.back());
        assert!(ctl.back());
        assert!(ctl.back());
        assert_eq!(ctl.depth(), 1);
        assert!(Arc::ptr_eq(ctl.current_course().unwrap(), &root_course));
        assert_eq!(*ctl.phase(), Phase::Ready);

        // At the root: no-op, state unchanged
        assert!(!ctl.back());
        assert_eq!(ctl.depth(), 1);
        assert_eq!(*ctl.phase(), Phase::Ready);
    }

    #[test]
    fn back_during_loading_discards_the_late_result() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "qubits", "Qubits");
        let choice = Choice { key: "1".to_string(), text: "Bell's theorem".to_string() };
        let req = fetch(ctl.select_branch(&choice));
        ctl.resolve(req.ticket, Ok(course("Bell's Theorem")));
        assert_eq!(ctl.depth(), 2);

        // Start another fetch, then back out while it is in flight
        let choice2 = Choice { key: "2".to_string(), text: "EPR paradox".to_string() };
        let stale = fetch(ctl.select_branch(&choice2));
        assert!(ctl.is_loading());
        assert!(ctl.back());
        assert_eq!(*ctl.phase(), Phase::Ready);
        assert_eq!(ctl.depth(), 1);

        // The orphaned request resolves late — must not be applied
        assert!(!ctl.resolve(stale.ticket, Ok(course("EPR Paradox"))));
        assert_eq!(ctl.depth(), 1);
        assert_eq!(*ctl.phase(), Phase::Ready);
        assert_eq!(ctl.current().unwrap().key, "qubits");
        // And its annotation never landed on the old parent
        assert_eq!(ctl.history().nodes()[0].selected, Some(Selection::Branch("1".to_string())));
    }

    #[test]
    fn back_clears_a_pending_error() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "qubits", "Qubits");
        let choice = Choice { key: "1".to_string(), text: "Bell's theorem".to_string() };
        let req = fetch(ctl.select_branch(&choice));
        ctl.resolve(req.ticket, Ok(course("Bell's Theorem")));

        let req = fetch(ctl.deepen());
        ctl.resolve(req.ticket, Err("timeout".to_string()));
        assert_eq!(*ctl.phase(), Phase::Errored);

        assert!(ctl.back());
        assert_eq!(*ctl.phase(), Phase::Ready);
        assert_eq!(ctl.error(), None);
    }

    #[test]
    fn transport_and_sentinel_failures_look_identical() {
        // The controller sees only success vs failure; both kinds land in
        // Errored with a message, nothing else differs.
        for msg in ["Not Valid Content", "API error 502: bad gateway"] {
            let mut ctl = SessionController::new("Quantum computing");
            let req = fetch(ctl.start("qubits"));
            ctl.resolve(req.ticket, Err(msg.to_string()));
            assert_eq!(*ctl.phase(), Phase::Errored);
            assert!(ctl.error().is_some());
            assert_eq!(ctl.depth(), 0);
        }
    }

    #[test]
    fn empty_failure_message_gets_per_action_fallback() {
        let mut ctl = SessionController::new("Quantum computing");
        let req = fetch(ctl.start("qubits"));
        ctl.resolve(req.ticket, Err("  ".to_string()));
        assert_eq!(ctl.error(), Some("Something went wrong generating the course."));

        started(&mut ctl, "qubits again", "Qubits");
        let choice = Choice { key: "1".to_string(), text: "Bell's theorem".to_string() };
        let req = fetch(ctl.select_branch(&choice));
        ctl.resolve(req.ticket, Err(String::new()));
        assert_eq!(ctl.error(), Some("Something went wrong generating the branch."));
    }

    #[test]
    fn deepen_twice_hits_the_cache_the_second_time() {
        let mut ctl = SessionController::new("Quantum computing");
        started(&mut ctl, "qubits", "Qubits");

        let req = fetch(ctl.deepen());
        ctl.resolve(req.ticket, Ok(course("Qubits, Deeper")));
        let deep = ctl.current_course().unwrap().clone();

        assert!(ctl.back());
        // Same derived prompt → same key → instant
        match ctl.deepen() {
            Dispatch::Ready => {}
            other => panic!("expected cache hit, got {other:?}"),
        }
        assert!(Arc::ptr_eq(ctl.current_course().unwrap(), &deep));
        assert_eq!(ctl.history().nodes()[0].selected, Some(Selection::Deeper));
    }
}
