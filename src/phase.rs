//! Fixed workflow structure: the agent roster and the phase table.
//!
//! These are configuration data, not behavior. The transition engine and the
//! stores consume them; nothing in this module reads or writes state.

/// Every agent row a project is seeded with, in creation order.
pub const AGENT_ROSTER: [&str; 7] = [
    "architect",
    "planner",
    "backend",
    "frontend",
    "qa",
    "devops",
    "docs",
];

/// Synthetic coordinator named in phase rosters. Never stored as an agent
/// row and never reset on transition.
pub const ORCHESTRATOR: &str = "orchestrator";

pub const FIRST_PHASE: i64 = 1;
pub const LAST_PHASE: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSpec {
    pub number: i64,
    pub name: &'static str,
    pub agents: &'static [&'static str],
}

const PHASES: [PhaseSpec; 6] = [
    PhaseSpec {
        number: 1,
        name: "Analysis & Planning",
        agents: &["architect", "planner"],
    },
    PhaseSpec {
        number: 2,
        name: "Specification",
        agents: &["orchestrator"],
    },
    PhaseSpec {
        number: 3,
        name: "Implementation",
        agents: &["backend", "frontend", "qa"],
    },
    PhaseSpec {
        number: 4,
        name: "Infrastructure",
        agents: &["devops", "qa"],
    },
    PhaseSpec {
        number: 5,
        name: "Documentation",
        agents: &["docs"],
    },
    PhaseSpec {
        number: 6,
        name: "Validation",
        agents: &["orchestrator"],
    },
];

pub fn all_phases() -> &'static [PhaseSpec] {
    &PHASES
}

pub fn phase_spec(number: i64) -> Option<&'static PhaseSpec> {
    PHASES.iter().find(|p| p.number == number)
}

pub fn phase_name(number: i64) -> Option<&'static str> {
    phase_spec(number).map(|p| p.name)
}

/// The stored agent rows that participate in a phase: its roster minus the
/// synthetic orchestrator. These are the agents a transition resets.
pub fn tracked_participants(number: i64) -> Option<Vec<&'static str>> {
    phase_spec(number).map(|p| {
        p.agents
            .iter()
            .copied()
            .filter(|a| *a != ORCHESTRATOR)
            .collect()
    })
}
