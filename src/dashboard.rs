//! Training dashboard
//!
//! Aggregates what the backend knows about the user into a short summary.

use crate::error::GatewayError;
use crate::gateway::{AuthUser, IdentityGateway, Note, PersistenceGateway, Recording};
use crate::recording::{format_time, parse_time};
use crate::training::{Exercise, CATALOG};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub greeting_name: String,
    pub note_count: usize,
    pub recording_count: usize,
    /// Sum of recording durations in seconds
    pub total_recorded_secs: u64,
    pub latest_recording: Option<String>,
    pub latest_note: Option<String>,
    pub programme: &'static [Exercise],
}

/// Build the summary. Lists are expected newest first.
pub fn summarize(user: Option<&AuthUser>, notes: &[Note], recordings: &[Recording]) -> DashboardSummary {
    let total_recorded_secs = recordings
        .iter()
        .filter_map(|r| {
            let secs = parse_time(&r.duration);
            if secs.is_none() {
                tracing::debug!("Recording {} has unreadable duration '{}'", r.id, r.duration);
            }
            secs
        })
        .sum();

    DashboardSummary {
        greeting_name: user
            .map(|u| u.greeting_name().to_string())
            .unwrap_or_else(|| "Artist".to_string()),
        note_count: notes.len(),
        recording_count: recordings.len(),
        total_recorded_secs,
        latest_recording: recordings.first().map(|r| r.title.clone()),
        latest_note: notes.first().map(|n| n.title.clone()),
        programme: CATALOG,
    }
}

/// Fetch everything the dashboard shows. Requires a signed-in user.
pub fn load<G>(gateway: &G) -> Result<DashboardSummary, GatewayError>
where
    G: IdentityGateway + PersistenceGateway + ?Sized,
{
    let user = gateway.current_user()?.ok_or(GatewayError::NotAuthenticated)?;
    let notes = gateway.list_notes()?;
    let recordings = gateway.list_recordings()?;
    Ok(summarize(Some(&user), &notes, &recordings))
}

impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Welcome, {}!", self.greeting_name)?;
        writeln!(f)?;
        writeln!(f, "  Notes:          {}", self.note_count)?;
        writeln!(f, "  Recordings:     {}", self.recording_count)?;
        writeln!(f, "  Time recorded:  {}", format_time(self.total_recorded_secs))?;
        if let Some(ref title) = self.latest_recording {
            writeln!(f, "  Last recording: {}", title)?;
        }
        if let Some(ref title) = self.latest_note {
            writeln!(f, "  Last note:      {}", title)?;
        }
        writeln!(f)?;
        writeln!(f, "Today's programme:")?;
        for (i, exercise) in self.programme.iter().enumerate() {
            writeln!(
                f,
                "  {}. {} ({} min, {})",
                i + 1,
                exercise.title,
                exercise.minutes,
                exercise.level
            )?;
        }
        Ok(())
    }
}
