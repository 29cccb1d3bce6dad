//! Terminal tab multiplexing state machine.
//!
//! A session owns up to six terminal tabs. Tab `"1"` exists from the moment
//! the session opens, can never be closed, and always sits first in the tab
//! order. All mutation goes through [`SessionMux`]; an operation that would
//! break an invariant comes back as [`MuxOutcome::Rejected`] and leaves the
//! state exactly as it was.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MuxPolicyRejection;
use crate::identity::{MAX_TABS, SessionId, TerminalId};

/// How long a press must be held before it arms a close confirmation.
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalTab {
    pub id: TerminalId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TilingLayout {
    #[default]
    #[serde(rename = "tabbed")]
    Tabbed,
    #[serde(rename = "2-split")]
    TwoSplit,
    #[serde(rename = "3-split")]
    ThreeSplit,
    #[serde(rename = "4-grid")]
    FourGrid,
}

impl TilingLayout {
    /// Number of tabs shown at once.
    pub fn pane_count(self) -> usize {
        match self {
            Self::Tabbed => 1,
            Self::TwoSplit => 2,
            Self::ThreeSplit => 3,
            Self::FourGrid => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilingConfig {
    pub enabled: bool,
    pub layout: TilingLayout,
}

impl TilingConfig {
    pub const DISABLED: TilingConfig = TilingConfig {
        enabled: false,
        layout: TilingLayout::Tabbed,
    };

    pub fn new(enabled: bool, layout: TilingLayout) -> Self {
        Self { enabled, layout }
    }

    /// True when more than one tab is on screen. `layout` is ignored while
    /// tiling is disabled.
    pub fn is_tiled(&self) -> bool {
        self.enabled && self.layout.pane_count() > 1
    }
}

// --- State ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawMuxState")]
pub struct SessionMuxState {
    tabs: BTreeMap<TerminalId, TerminalTab>,
    tab_order: Vec<TerminalId>,
    active_tab_id: TerminalId,
    tiling: TilingConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMuxState {
    tabs: BTreeMap<TerminalId, TerminalTab>,
    tab_order: Vec<TerminalId>,
    active_tab_id: TerminalId,
    #[serde(default)]
    tiling: TilingConfig,
}

impl TryFrom<RawMuxState> for SessionMuxState {
    type Error = MuxPolicyRejection;

    fn try_from(raw: RawMuxState) -> Result<Self, Self::Error> {
        if raw.tabs.iter().any(|(key, tab)| *key != tab.id) {
            return Err(MuxPolicyRejection::TabKeyMismatch);
        }
        SessionMuxState::restore(
            raw.tabs.into_values().collect(),
            raw.tab_order,
            raw.active_tab_id,
            raw.tiling,
        )
    }
}

impl SessionMuxState {
    /// Fresh state with only tab `"1"`, active and untiled.
    pub fn new(opened_at: DateTime<Utc>) -> Self {
        let primary = TerminalTab {
            id: TerminalId::PRIMARY,
            created_at: opened_at,
        };
        Self {
            tabs: BTreeMap::from([(TerminalId::PRIMARY, primary)]),
            tab_order: vec![TerminalId::PRIMARY],
            active_tab_id: TerminalId::PRIMARY,
            tiling: TilingConfig::DISABLED,
        }
    }

    /// Rebuild a state from previously stored parts, re-checking every
    /// invariant.
    pub fn restore(
        tabs: Vec<TerminalTab>,
        tab_order: Vec<TerminalId>,
        active_tab_id: TerminalId,
        tiling: TilingConfig,
    ) -> Result<Self, MuxPolicyRejection> {
        if tabs.len() > MAX_TABS {
            return Err(MuxPolicyRejection::TabLimitReached);
        }
        let tabs: BTreeMap<_, _> = tabs.into_iter().map(|t| (t.id, t)).collect();
        if !tabs.contains_key(&TerminalId::PRIMARY) {
            return Err(MuxPolicyRejection::PrimaryTabFixed);
        }
        if !is_permutation(&tab_order, &tabs) {
            return Err(MuxPolicyRejection::NotAPermutation);
        }
        if tab_order.first() != Some(&TerminalId::PRIMARY) {
            return Err(MuxPolicyRejection::PrimaryTabFixed);
        }
        if !tabs.contains_key(&active_tab_id) {
            return Err(MuxPolicyRejection::UnknownTab);
        }
        Ok(Self {
            tabs,
            tab_order,
            active_tab_id,
            tiling,
        })
    }

    pub fn tabs(&self) -> impl Iterator<Item = &TerminalTab> {
        self.tabs.values()
    }

    pub fn tab(&self, id: TerminalId) -> Option<&TerminalTab> {
        self.tabs.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// Never true; tab `"1"` is always present.
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tabs.len() >= MAX_TABS
    }

    pub fn contains(&self, id: TerminalId) -> bool {
        self.tabs.contains_key(&id)
    }

    pub fn tab_order(&self) -> &[TerminalId] {
        &self.tab_order
    }

    pub fn active_tab_id(&self) -> TerminalId {
        self.active_tab_id
    }

    pub fn tiling(&self) -> TilingConfig {
        self.tiling
    }

    /// Tabs currently on screen: the leading panes of the tab order while
    /// tiled, otherwise just the active tab.
    pub fn visible_tabs(&self) -> &[TerminalId] {
        if self.tiling.is_tiled() {
            let n = self.tiling.layout.pane_count().min(self.tab_order.len());
            &self.tab_order[..n]
        } else {
            std::slice::from_ref(&self.active_tab_id)
        }
    }

    pub fn is_visible(&self, id: TerminalId) -> bool {
        self.visible_tabs().contains(&id)
    }

    fn lowest_free_id(&self) -> Option<TerminalId> {
        TerminalId::ALL
            .into_iter()
            .find(|id| !self.tabs.contains_key(id))
    }
}

fn is_permutation(order: &[TerminalId], tabs: &BTreeMap<TerminalId, TerminalTab>) -> bool {
    if order.len() != tabs.len() {
        return false;
    }
    let mut seen = [false; MAX_TABS];
    for id in order {
        let slot = &mut seen[(id.get() - 1) as usize];
        if *slot || !tabs.contains_key(id) {
            return false;
        }
        *slot = true;
    }
    true
}

// --- Actions and outcomes ---

/// Whether the session is shown in a compact (touch) layout, which changes
/// what tapping the active tab does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    #[default]
    Standard,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxAction {
    AddTab,
    RemoveTab(TerminalId),
    Reorder(Vec<TerminalId>),
    SelectTab(TerminalId),
    SetTiling(TilingConfig),
    /// A press on a tab was released (or reached the threshold) after `held`.
    PressHeld {
        id: TerminalId,
        held: Duration,
    },
    ConfirmClose,
    /// Explicit cancel, or any interaction outside the confirmation prompt.
    CancelClose,
}

/// Observable effects of an applied operation, for whatever persists
/// session preferences or drives the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MuxIntent {
    TabAdded { id: TerminalId },
    TabRemoved { id: TerminalId },
    Activated { id: TerminalId },
    OrderChanged { order: Vec<TerminalId> },
    TilingChanged { tiling: TilingConfig },
    CloseConfirmArmed { id: TerminalId },
    CloseConfirmCleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxOutcome {
    Applied(Vec<MuxIntent>),
    Rejected(MuxPolicyRejection),
}

impl MuxOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn intents(&self) -> &[MuxIntent] {
        match self {
            Self::Applied(intents) => intents,
            Self::Rejected(_) => &[],
        }
    }

    pub fn rejection(&self) -> Option<MuxPolicyRejection> {
        match self {
            Self::Applied(_) => None,
            Self::Rejected(r) => Some(*r),
        }
    }
}

// --- Session context ---

/// Per-session multiplexing context. Created when a session opens and
/// dropped (via [`SessionMux::close`]) when it closes.
#[derive(Debug, Clone)]
pub struct SessionMux {
    session_id: SessionId,
    state: SessionMuxState,
    presentation: Presentation,
    close_confirm_pending: Option<TerminalId>,
}

impl SessionMux {
    pub fn open(session_id: SessionId, presentation: Presentation) -> Self {
        Self::with_state(session_id, SessionMuxState::new(Utc::now()), presentation)
    }

    pub fn with_state(
        session_id: SessionId,
        state: SessionMuxState,
        presentation: Presentation,
    ) -> Self {
        Self {
            session_id,
            state,
            presentation,
            close_confirm_pending: None,
        }
    }

    /// End the session, handing back its final state.
    pub fn close(self) -> SessionMuxState {
        self.state
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> &SessionMuxState {
        &self.state
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn set_presentation(&mut self, presentation: Presentation) {
        self.presentation = presentation;
    }

    pub fn close_confirm_pending(&self) -> Option<TerminalId> {
        self.close_confirm_pending
    }

    pub fn apply(&mut self, action: MuxAction) -> MuxOutcome {
        let result = match action {
            MuxAction::AddTab => self.add_tab_inner(),
            MuxAction::RemoveTab(id) => self.remove_tab_inner(id),
            MuxAction::Reorder(order) => self.reorder_inner(order),
            MuxAction::SelectTab(id) => return self.select_tab_inner(id),
            MuxAction::SetTiling(tiling) => Ok(self.set_tiling_inner(tiling)),
            MuxAction::PressHeld { id, held } => return self.press_held_inner(id, held),
            MuxAction::ConfirmClose => return self.confirm_close_inner(),
            MuxAction::CancelClose => {
                return MuxOutcome::Applied(self.clear_pending().into_iter().collect());
            }
        };
        match result {
            Ok(mut intents) => {
                intents.extend(self.clear_pending());
                MuxOutcome::Applied(intents)
            }
            Err(rejection) => MuxOutcome::Rejected(rejection),
        }
    }

    pub fn add_tab(&mut self) -> MuxOutcome {
        self.apply(MuxAction::AddTab)
    }

    pub fn remove_tab(&mut self, id: TerminalId) -> MuxOutcome {
        self.apply(MuxAction::RemoveTab(id))
    }

    pub fn reorder(&mut self, new_order: Vec<TerminalId>) -> MuxOutcome {
        self.apply(MuxAction::Reorder(new_order))
    }

    pub fn select_tab(&mut self, id: TerminalId) -> MuxOutcome {
        self.apply(MuxAction::SelectTab(id))
    }

    pub fn set_tiling(&mut self, enabled: bool, layout: TilingLayout) -> MuxOutcome {
        self.apply(MuxAction::SetTiling(TilingConfig::new(enabled, layout)))
    }

    pub fn press_held(&mut self, id: TerminalId, held: Duration) -> MuxOutcome {
        self.apply(MuxAction::PressHeld { id, held })
    }

    pub fn confirm_close(&mut self) -> MuxOutcome {
        self.apply(MuxAction::ConfirmClose)
    }

    pub fn cancel_close(&mut self) -> MuxOutcome {
        self.apply(MuxAction::CancelClose)
    }

    fn add_tab_inner(&mut self) -> Result<Vec<MuxIntent>, MuxPolicyRejection> {
        let id = self
            .state
            .lowest_free_id()
            .ok_or(MuxPolicyRejection::TabLimitReached)?;
        self.state.tabs.insert(
            id,
            TerminalTab {
                id,
                created_at: Utc::now(),
            },
        );
        self.state.tab_order.push(id);
        self.state.active_tab_id = id;
        Ok(vec![MuxIntent::TabAdded { id }, MuxIntent::Activated { id }])
    }

    fn remove_tab_inner(&mut self, id: TerminalId) -> Result<Vec<MuxIntent>, MuxPolicyRejection> {
        if id.is_primary() {
            return Err(MuxPolicyRejection::PrimaryTabFixed);
        }
        let pos = self
            .state
            .tab_order
            .iter()
            .position(|t| *t == id)
            .ok_or(MuxPolicyRejection::UnknownTab)?;

        self.state.tab_order.remove(pos);
        self.state.tabs.remove(&id);

        let mut intents = vec![MuxIntent::TabRemoved { id }];
        if self.state.active_tab_id == id {
            let next = self
                .state
                .tab_order
                .get(pos)
                .copied()
                .unwrap_or(TerminalId::PRIMARY);
            self.state.active_tab_id = next;
            intents.push(MuxIntent::Activated { id: next });
        }
        Ok(intents)
    }

    fn reorder_inner(
        &mut self,
        new_order: Vec<TerminalId>,
    ) -> Result<Vec<MuxIntent>, MuxPolicyRejection> {
        if !is_permutation(&new_order, &self.state.tabs) {
            return Err(MuxPolicyRejection::NotAPermutation);
        }
        if new_order[0] != TerminalId::PRIMARY {
            return Err(MuxPolicyRejection::PrimaryTabFixed);
        }
        if new_order == self.state.tab_order {
            return Ok(Vec::new());
        }
        self.state.tab_order = new_order.clone();
        Ok(vec![MuxIntent::OrderChanged { order: new_order }])
    }

    fn select_tab_inner(&mut self, id: TerminalId) -> MuxOutcome {
        if !self.state.contains(id) {
            return MuxOutcome::Rejected(MuxPolicyRejection::UnknownTab);
        }

        // A tab the layout hides comes back as the only tab on screen, even
        // when it was already the active one.
        if self.state.tiling.enabled && !self.state.is_visible(id) {
            let mut intents = self.set_tiling_inner(TilingConfig::DISABLED);
            self.state.active_tab_id = id;
            intents.push(MuxIntent::Activated { id });
            intents.extend(self.clear_pending());
            return MuxOutcome::Applied(intents);
        }

        // Tapping the already-active tab on a compact layout asks to close it.
        if self.presentation == Presentation::Compact
            && id == self.state.active_tab_id
            && !id.is_primary()
        {
            self.close_confirm_pending = Some(id);
            return MuxOutcome::Applied(vec![MuxIntent::CloseConfirmArmed { id }]);
        }

        let mut intents = Vec::new();
        if self.state.active_tab_id != id {
            self.state.active_tab_id = id;
            intents.push(MuxIntent::Activated { id });
        }
        intents.extend(self.clear_pending());
        MuxOutcome::Applied(intents)
    }

    fn set_tiling_inner(&mut self, tiling: TilingConfig) -> Vec<MuxIntent> {
        if self.state.tiling == tiling {
            return Vec::new();
        }
        self.state.tiling = tiling;
        vec![MuxIntent::TilingChanged { tiling }]
    }

    fn press_held_inner(&mut self, id: TerminalId, held: Duration) -> MuxOutcome {
        if !self.state.contains(id) {
            return MuxOutcome::Rejected(MuxPolicyRejection::UnknownTab);
        }
        if id.is_primary() {
            return MuxOutcome::Rejected(MuxPolicyRejection::PrimaryTabFixed);
        }
        if held < LONG_PRESS_THRESHOLD {
            return MuxOutcome::Rejected(MuxPolicyRejection::PressTooShort);
        }
        self.close_confirm_pending = Some(id);
        MuxOutcome::Applied(vec![MuxIntent::CloseConfirmArmed { id }])
    }

    fn confirm_close_inner(&mut self) -> MuxOutcome {
        let Some(id) = self.close_confirm_pending else {
            return MuxOutcome::Rejected(MuxPolicyRejection::NothingPending);
        };
        match self.remove_tab_inner(id) {
            Ok(intents) => {
                self.close_confirm_pending = None;
                MuxOutcome::Applied(intents)
            }
            Err(rejection) => MuxOutcome::Rejected(rejection),
        }
    }

    fn clear_pending(&mut self) -> Option<MuxIntent> {
        self.close_confirm_pending
            .take()
            .map(|_| MuxIntent::CloseConfirmCleared)
    }
}
