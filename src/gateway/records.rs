//! Notes and recordings
//!
//! Rows live in the `notes` and `recordings` tables, scoped to the signed-in
//! user. Recording audio lives in an object-storage bucket; the row keeps the
//! public URL of the file.

use super::client::{read_json, send_error, BackendClient, SINGLE_OBJECT};
use super::{NewNote, NewRecording, Note, PersistenceGateway, Recording};
use crate::error::GatewayError;
use serde::Deserialize;

/// Storage file name for a recording: `<millis>-<slug>.wav`
pub fn storage_file_name(title: &str, millis: i64) -> String {
    format!("{}-{}.wav", millis, slugify(title))
}

/// Lowercase ASCII slug, runs of other characters collapsed to one dash
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "recording".to_string()
    } else {
        slug.to_string()
    }
}

/// Public URL of an object in a bucket
pub fn public_url(base_url: &str, bucket: &str, file_name: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        file_name
    )
}

/// Object name from a public URL (last path segment, query dropped)
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Largest audio file `recording_audio` reads
const MAX_AUDIO_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Deserialize)]
struct AudioUrlRow {
    audio_url: String,
}

impl BackendClient {
    fn upload_audio(&self, token: &str, file_name: &str, wav: &[u8]) -> Result<(), GatewayError> {
        let path = format!("/storage/v1/object/{}/{}", self.bucket(), file_name);
        self.request("POST", &path, Some(token))
            .set("Content-Type", "audio/wav")
            .send_bytes(wav)
            .map_err(send_error)?;
        tracing::debug!("Uploaded {} ({} bytes)", file_name, wav.len());
        Ok(())
    }

    fn remove_audio(&self, token: &str, file_name: &str) -> Result<(), GatewayError> {
        let path = format!("/storage/v1/object/{}", self.bucket());
        self.request("DELETE", &path, Some(token))
            .send_json(serde_json::json!({ "prefixes": [file_name] }))
            .map_err(send_error)?;
        tracing::debug!("Removed {} from storage", file_name);
        Ok(())
    }

    fn list_rows<T: serde::de::DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, GatewayError> {
        let session = self.active_session()?;
        let response = self
            .request("GET", &format!("/rest/v1/{}", table), Some(&session.access_token))
            .query("select", "*")
            .query("user_id", &format!("eq.{}", session.user.id))
            .query("order", "created_at.desc")
            .call()
            .map_err(send_error)?;
        read_json(response)
    }

    fn audio_url(&self, token: &str, user_id: &str, id: i64) -> Result<String, GatewayError> {
        let response = self
            .request("GET", "/rest/v1/recordings", Some(token))
            .set("Accept", SINGLE_OBJECT)
            .query("select", "audio_url")
            .query("id", &format!("eq.{}", id))
            .query("user_id", &format!("eq.{}", user_id))
            .call()
            .map_err(send_error)?;
        let row: AudioUrlRow = read_json(response)?;
        Ok(row.audio_url)
    }

    fn delete_row(&self, table: &str, token: &str, user_id: &str, id: i64) -> Result<(), GatewayError> {
        self.request("DELETE", &format!("/rest/v1/{}", table), Some(token))
            .query("id", &format!("eq.{}", id))
            .query("user_id", &format!("eq.{}", user_id))
            .call()
            .map_err(send_error)?;
        Ok(())
    }
}

impl PersistenceGateway for BackendClient {
    fn list_notes(&self) -> Result<Vec<Note>, GatewayError> {
        let notes: Vec<Note> = self.list_rows("notes")?;
        tracing::debug!("Fetched {} notes", notes.len());
        Ok(notes)
    }

    fn create_note(&self, note: &NewNote) -> Result<Note, GatewayError> {
        if note.title.trim().is_empty() {
            return Err(GatewayError::Validation(
                "Please give the note a title".to_string(),
            ));
        }
        let session = self.active_session()?;
        let response = self
            .request("POST", "/rest/v1/notes", Some(&session.access_token))
            .set("Prefer", "return=representation")
            .set("Accept", SINGLE_OBJECT)
            .send_json(serde_json::json!([{
                "title": note.title,
                "content": note.content,
                "date": note.date,
                "user_id": session.user.id,
            }]))
            .map_err(send_error)?;
        let created: Note = read_json(response)?;
        tracing::info!("Created note {}", created.id);
        Ok(created)
    }

    fn delete_note(&self, id: i64) -> Result<(), GatewayError> {
        let session = self.active_session()?;
        self.delete_row("notes", &session.access_token, &session.user.id, id)?;
        tracing::info!("Deleted note {}", id);
        Ok(())
    }

    fn list_recordings(&self) -> Result<Vec<Recording>, GatewayError> {
        let recordings: Vec<Recording> = self.list_rows("recordings")?;
        tracing::debug!("Fetched {} recordings", recordings.len());
        Ok(recordings)
    }

    fn create_recording(&self, recording: &NewRecording) -> Result<Recording, GatewayError> {
        recording.validate()?;
        if recording.audio.mime_type() != crate::audio::wav::WAV_MIME {
            return Err(GatewayError::Validation(format!(
                "Recordings are stored as WAV, got {}",
                recording.audio.mime_type()
            )));
        }
        let session = self.active_session()?;
        let token = session.access_token.as_str();

        let file_name = storage_file_name(
            &recording.title,
            chrono::Utc::now().timestamp_millis(),
        );
        self.upload_audio(token, &file_name, recording.audio.payload())?;
        let audio_url = public_url(self.base_url(), self.bucket(), &file_name);

        let inserted = self
            .request("POST", "/rest/v1/recordings", Some(token))
            .set("Prefer", "return=representation")
            .set("Accept", SINGLE_OBJECT)
            .send_json(serde_json::json!([{
                "title": recording.title.trim(),
                "audio_url": audio_url,
                "duration": recording.duration,
                "date": recording.date,
                "user_id": session.user.id,
            }]))
            .map_err(send_error)
            .and_then(read_json::<Recording>);

        match inserted {
            Ok(row) => {
                tracing::info!("Saved recording {} ({})", row.id, row.duration);
                Ok(row)
            }
            Err(e) => {
                // Do not leave an orphaned file behind
                if let Err(cleanup) = self.remove_audio(token, &file_name) {
                    tracing::warn!("Failed to remove uploaded {}: {}", file_name, cleanup);
                }
                Err(e)
            }
        }
    }

    fn recording_audio(&self, id: i64) -> Result<Vec<u8>, GatewayError> {
        let session = self.active_session()?;
        let audio_url = self.audio_url(&session.access_token, &session.user.id, id)?;
        let audio = self.download(&audio_url, MAX_AUDIO_BYTES)?;
        tracing::debug!("Downloaded recording {} ({} bytes)", id, audio.len());
        Ok(audio)
    }

    fn delete_recording(&self, id: i64) -> Result<(), GatewayError> {
        let session = self.active_session()?;
        let token = session.access_token.as_str();

        let audio_url = self.audio_url(token, &session.user.id, id)?;
        let file_name = file_name_from_url(&audio_url).ok_or_else(|| {
            GatewayError::Decode(format!("No file name in audio url '{}'", audio_url))
        })?;
        self.remove_audio(token, file_name)?;
        self.delete_row("recordings", token, &session.user.id, id)?;
        tracing::info!("Deleted recording {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Morning Warm-up"), "morning-warm-up");
        assert_eq!(slugify("  Scales -- C major!! "), "scales-c-major");
        assert_eq!(slugify("Vocalises avancées"), "vocalises-avanc-es");
        assert_eq!(slugify("???"), "recording");
    }

    #[test]
    fn test_storage_file_name() {
        assert_eq!(
            storage_file_name("Breathing drill", 1_700_000_000_123),
            "1700000000123-breathing-drill.wav"
        );
    }

    #[test]
    fn test_public_url_round_trip() {
        let url = public_url("https://abcd.example.co/", "recordings", "1-take.wav");
        assert_eq!(
            url,
            "https://abcd.example.co/storage/v1/object/public/recordings/1-take.wav"
        );
        assert_eq!(file_name_from_url(&url), Some("1-take.wav"));
    }

    #[test]
    fn test_file_name_from_url_drops_query() {
        assert_eq!(
            file_name_from_url("https://x/storage/v1/object/public/recordings/a.wav?t=1"),
            Some("a.wav")
        );
        assert_eq!(file_name_from_url("https://x/dir/"), None);
    }
}
