//! Exercise catalog
//!
//! A fixed programme of exercises, stepped through one at a time. Moving past
//! the last exercise wraps around to the first.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Beginner => write!(f, "Beginner"),
            Level::Intermediate => write!(f, "Intermediate"),
            Level::Advanced => write!(f, "Advanced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    pub title: &'static str,
    pub minutes: u32,
    pub description: &'static str,
    pub level: Level,
    pub focus: &'static str,
}

pub const CATALOG: &[Exercise] = &[
    Exercise {
        title: "Vocal warm-up",
        minutes: 10,
        description: "A series of exercises to get your voice ready",
        level: Level::Beginner,
        focus: "Vocal technique",
    },
    Exercise {
        title: "Breathing exercises",
        minutes: 15,
        description: "Master your breath for better vocal control",
        level: Level::Intermediate,
        focus: "Breathing",
    },
    Exercise {
        title: "Advanced vocalises",
        minutes: 20,
        description: "Extend your range and vocal agility",
        level: Level::Advanced,
        focus: "Vocal technique",
    },
];

/// Position in the catalog
#[derive(Debug, Clone, Default)]
pub struct Programme {
    current: usize,
}

impl Programme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `steps` exercises into the programme
    pub fn starting_at(steps: usize) -> Self {
        Self {
            current: steps % CATALOG.len(),
        }
    }

    pub fn current(&self) -> &'static Exercise {
        &CATALOG[self.current]
    }

    pub fn index(&self) -> usize {
        self.current
    }

    /// Advance to the next exercise, wrapping after the last
    pub fn next(&mut self) -> &'static Exercise {
        self.current = (self.current + 1) % CATALOG.len();
        self.current()
    }

    pub fn total_minutes() -> u32 {
        CATALOG.iter().map(|e| e.minutes).sum()
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} min, {}, {})\n  {}",
            self.title, self.minutes, self.level, self.focus, self.description
        )
    }
}
