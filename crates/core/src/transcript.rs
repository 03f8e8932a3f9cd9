use std::io;
use std::path::{Path, PathBuf};

use crate::domain::ids::TicketId;
use crate::platform::ChannelMessage;

/// Renders and persists close-time transcripts. One plain-text file per
/// closed ticket, named by ticket id, written before the channel is deleted.
#[derive(Clone, Debug)]
pub struct TranscriptWriter {
    dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, ticket_id: TicketId) -> PathBuf {
        self.dir.join(format!("{ticket_id}.txt"))
    }

    /// One line per message: `dd/mm/yyyy author -> content`, author padded so
    /// the arrows line up for the common case of short handles.
    pub fn render(ticket_id: TicketId, messages: &[ChannelMessage]) -> String {
        let mut out = format!("Here is the message log for ticket ID {ticket_id}\n----------\n\n");
        for message in messages {
            out.push_str(&format!(
                "{} {:<15} -> {}\n",
                message.sent_at.format("%d/%m/%Y"),
                message.author,
                message.content
            ));
        }
        out
    }

    pub async fn write(
        &self,
        ticket_id: TicketId,
        messages: &[ChannelMessage],
    ) -> Result<PathBuf, io::Error> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(ticket_id);
        tokio::fs::write(&path, Self::render(ticket_id, messages)).await?;
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use crate::domain::ids::TicketId;
    use crate::platform::ChannelMessage;

    use super::TranscriptWriter;

    fn message(author: &str, content: &str) -> ChannelMessage {
        ChannelMessage {
            author: author.to_string(),
            content: content.to_string(),
            sent_at: Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).single().expect("valid date"),
        }
    }

    #[test]
    fn render_includes_header_and_one_line_per_message() {
        let rendered = TranscriptWriter::render(
            TicketId(7),
            &[message("alice", "hi, my order is stuck"), message("staffer", "looking into it")],
        );

        assert!(rendered.starts_with("Here is the message log for ticket ID 7\n----------\n\n"));
        assert!(rendered.contains("09/03/2024 alice           -> hi, my order is stuck\n"));
        assert!(rendered.contains("09/03/2024 staffer         -> looking into it\n"));
    }

    #[test]
    fn render_of_empty_history_is_just_the_header() {
        let rendered = TranscriptWriter::render(TicketId(1), &[]);
        assert_eq!(rendered, "Here is the message log for ticket ID 1\n----------\n\n");
    }

    #[tokio::test]
    async fn write_creates_the_directory_and_names_the_file_by_ticket_id() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let writer = TranscriptWriter::new(dir.path().join("transcripts"));

        let path = writer
            .write(TicketId(12), &[message("alice", "hello")])
            .await
            .expect("write transcript");

        assert!(path.ends_with("12.txt"));
        let contents = tokio::fs::read_to_string(&path).await.expect("read back");
        assert!(contents.contains("alice"));
    }
}
