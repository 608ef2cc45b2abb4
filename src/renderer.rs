use crate::error::ExportError;
use crate::prompt::{self, Prompter};
use crate::timeline::LocalMessage;
use crate::utils::{escape_html, expand_home};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const HTML_HEAD: &str = "<html>\n<head>\n<meta charset=\"utf-8\"/>\n</head>\n<body>\n";
pub const HTML_TAIL: &str = "</body>\n</html>\n";

/// Extension Messages gives to rich-link previews; they have no viewable file.
const PLUGIN_PAYLOAD_EXTENSION: &str = "pluginPayloadAttachment";

/// U+FFFC, written as the text of a message that only carries an attachment.
pub const ATTACHMENT_PLACEHOLDER: char = '\u{FFFC}';

/// Display names for correspondents, keyed by handle identifier. Each
/// identifier is asked about at most once per run.
#[derive(Debug, Default)]
pub struct NameBook {
    names: HashMap<String, String>,
}

impl NameBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.names.get(identifier).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The bound name for `identifier`, asking for it on first use.
    pub fn name_for(
        &mut self,
        identifier: &str,
        prompter: &mut dyn Prompter,
    ) -> Result<&str, ExportError> {
        if !self.names.contains_key(identifier) {
            let name = prompt::ask(
                prompter,
                &format!("Enter a name for user \"{}\": ", identifier),
            )?;
            self.names.insert(identifier.to_string(), name);
        }
        Ok(self.names[identifier].as_str())
    }

    /// Bind every identifier up front instead of waiting for its first message.
    pub fn bind_all<I>(
        &mut self,
        identifiers: I,
        prompter: &mut dyn Prompter,
    ) -> Result<(), ExportError>
    where
        I: IntoIterator<Item = String>,
    {
        for identifier in identifiers {
            self.name_for(&identifier, prompter)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    Copied { href: String },
    Skipped,
    Missing { source: PathBuf },
}

/// Copies attachments into one directory as `0.ext`, `1.ext`, ... in the
/// order they are rendered. Only successful copies consume a number.
#[derive(Debug)]
pub struct AttachmentSink {
    dir: PathBuf,
    /// `dir` as seen from the folder holding the transcript.
    link_prefix: PathBuf,
    next_index: u64,
}

impl AttachmentSink {
    /// Create `dir`. It must not exist yet. Links are made relative to
    /// `link_base`, the folder the transcript is written to.
    pub fn create(dir: &Path, link_base: &Path) -> Result<Self, ExportError> {
        if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(dir).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => ExportError::AttachmentsDirExists(dir.to_path_buf()),
            _ => ExportError::Io(e),
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            link_prefix: relative_link(dir, link_base)?,
            next_index: 0,
        })
    }

    pub fn copied(&self) -> u64 {
        self.next_index
    }

    pub fn materialize(&mut self, source: &str) -> Result<AttachmentOutcome, ExportError> {
        let source_path = expand_home(source);
        let extension = source_path.extension().and_then(|e| e.to_str());
        if extension == Some(PLUGIN_PAYLOAD_EXTENSION) {
            return Ok(AttachmentOutcome::Skipped);
        }
        if !source_path.is_file() {
            return Ok(AttachmentOutcome::Missing {
                source: source_path,
            });
        }

        let file_name = match source_path.extension() {
            Some(ext) => format!("{}.{}", self.next_index, ext.to_string_lossy()),
            None => self.next_index.to_string(),
        };
        let dest = self.dir.join(&file_name);
        match fs::copy(&source_path, &dest) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(AttachmentOutcome::Missing {
                    source: source_path,
                });
            }
            Err(e) => return Err(ExportError::Io(e)),
        }
        self.next_index += 1;
        Ok(AttachmentOutcome::Copied {
            href: self.link_prefix.join(file_name).to_string_lossy().into_owned(),
        })
    }
}

fn relative_link(dir: &Path, link_base: &Path) -> io::Result<PathBuf> {
    let base = if link_base.as_os_str().is_empty() {
        Path::new(".")
    } else {
        link_base
    };
    let dir = std::path::absolute(dir)?;
    let base = std::path::absolute(base)?;
    Ok(pathdiff::diff_paths(&dir, &base).unwrap_or(dir))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub messages: usize,
    pub attachments_copied: usize,
    pub attachments_missing: usize,
    pub attachments_skipped: usize,
}

/// Everything the renderer needs besides the messages themselves.
pub struct RenderContext<'a> {
    pub owner_name: &'a str,
    pub names: &'a mut NameBook,
    pub attachments: &'a mut AttachmentSink,
    pub prompter: &'a mut dyn Prompter,
    pub progress: &'a ProgressBar,
    pub verbose: bool,
}

fn is_placeholder_only(text: &str) -> bool {
    text.contains(ATTACHMENT_PLACEHOLDER)
        && text
            .chars()
            .all(|c| c == ATTACHMENT_PLACEHOLDER || c.is_whitespace())
}

fn is_owner(msg: &LocalMessage) -> bool {
    msg.is_from_owner || (msg.handle_key == 0 && msg.sender.is_none())
}

/// Write `messages` as a complete HTML document.
///
/// Messages must already be in display order. Rows that share a message key
/// (one per attachment) are rendered as a single block.
pub fn render_transcript<W: Write>(
    writer: &mut W,
    messages: &[LocalMessage],
    ctx: &mut RenderContext<'_>,
) -> Result<RenderSummary, ExportError> {
    let mut summary = RenderSummary::default();
    let mut last_day: Option<NaiveDate> = None;

    writer.write_all(HTML_HEAD.as_bytes())?;

    for block in messages.chunk_by(|a, b| a.message_key == b.message_key) {
        let first = &block[0];

        let day = first.sent_at.date_naive();
        if last_day != Some(day) {
            writeln!(writer, "<h2>{}</h2>", first.sent_at.format("%A, %B %d, %Y"))?;
            last_day = Some(day);
        }

        let owner = is_owner(first);
        let align = if owner { "left" } else { "right" };
        writeln!(writer, "<p style=\"text-align:{}\">", align)?;

        let mut has_attachment = false;
        for source in block.iter().filter_map(|m| m.attachment.as_deref()) {
            has_attachment = true;
            write_attachment(writer, source, ctx, &mut summary)?;
        }

        // A bare placeholder stands in for the attachment rendered above.
        if let Some(text) = first.text.as_deref()
            && !text.is_empty()
            && !(has_attachment && is_placeholder_only(text))
        {
            writeln!(writer, "{}<br>", escape_html(text))?;
        }

        let name = if owner {
            ctx.owner_name.to_string()
        } else {
            let identifier = first
                .sender
                .clone()
                .unwrap_or_else(|| first.handle_key.to_string());
            let (names, prompter) = (&mut *ctx.names, &mut *ctx.prompter);
            ctx.progress
                .suspend(|| names.name_for(&identifier, prompter).map(str::to_string))?
        };
        writeln!(writer, "<small>{}</small><br>", escape_html(&name))?;
        writeln!(
            writer,
            "<small>{}</small><br>\n</p>",
            first.sent_at.format("%I:%M:%S %p")
        )?;

        summary.messages += 1;
        ctx.progress.inc(1);
    }

    writer.write_all(HTML_TAIL.as_bytes())?;
    Ok(summary)
}

fn write_attachment<W: Write>(
    writer: &mut W,
    source: &str,
    ctx: &mut RenderContext<'_>,
    summary: &mut RenderSummary,
) -> Result<(), ExportError> {
    match ctx.attachments.materialize(source)? {
        AttachmentOutcome::Copied { href } => {
            writeln!(writer, "<a href=\"{}\">Attachment</a><br>", escape_html(&href))?;
            summary.attachments_copied += 1;
            if ctx.verbose {
                ctx.progress.println(format!("Copied:   {} -> {}", source, href));
            }
        }
        AttachmentOutcome::Missing { source: path } => {
            writeln!(
                writer,
                "<i>Attachment not found: {}</i><br>",
                escape_html(&path.to_string_lossy())
            )?;
            summary.attachments_missing += 1;
            if ctx.verbose {
                ctx.progress.println(format!("Missing:  {}", path.display()));
            }
        }
        AttachmentOutcome::Skipped => {
            summary.attachments_skipped += 1;
            if ctx.verbose {
                ctx.progress.println(format!("Skipped:  {}", source));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::scripted::ScriptedPrompter;
    use crate::timeline::{to_local, utc_offset};
    use tempfile::TempDir;

    const NS: i64 = 1_000_000_000;
    const HOUR: i64 = 3600 * NS;

    fn msg(
        key: i64,
        date_ns: i64,
        from_owner: bool,
        sender: Option<&str>,
        text: Option<&str>,
    ) -> LocalMessage {
        LocalMessage {
            message_key: key,
            text: text.map(str::to_string),
            sent_at: to_local(date_ns, utc_offset(0).unwrap()),
            is_from_owner: from_owner,
            handle_key: if sender.is_some() { 1 } else { 0 },
            sender: sender.map(str::to_string),
            attachment: None,
        }
    }

    fn with_attachment(mut m: LocalMessage, path: &str) -> LocalMessage {
        m.attachment = Some(path.to_string());
        m
    }

    struct Harness {
        dir: TempDir,
        names: NameBook,
        sink: AttachmentSink,
        prompter: ScriptedPrompter,
    }

    impl Harness {
        fn new(answers: &[&str]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let sink = AttachmentSink::create(&dir.path().join("attachments"), dir.path()).unwrap();
            Self {
                dir,
                names: NameBook::new(),
                sink,
                prompter: ScriptedPrompter::new(answers.iter().copied()),
            }
        }

        fn render(&mut self, messages: &[LocalMessage]) -> (String, RenderSummary) {
            let progress = ProgressBar::hidden();
            let mut ctx = RenderContext {
                owner_name: "Me",
                names: &mut self.names,
                attachments: &mut self.sink,
                prompter: &mut self.prompter,
                progress: &progress,
                verbose: false,
            };
            let mut out = Vec::new();
            let summary = render_transcript(&mut out, messages, &mut ctx).unwrap();
            (String::from_utf8(out).unwrap(), summary)
        }

        fn source_file(&self, name: &str, contents: &[u8]) -> String {
            let path = self.dir.path().join(name);
            fs::write(&path, contents).unwrap();
            path.to_string_lossy().into_owned()
        }
    }

    #[test]
    fn document_is_wrapped_in_fixed_head_and_tail() {
        let (html, summary) = Harness::new(&[]).render(&[]);
        assert_eq!(html, format!("{}{}", HTML_HEAD, HTML_TAIL));
        assert_eq!(summary, RenderSummary::default());
    }

    #[test]
    fn day_headers_appear_when_the_calendar_day_changes() {
        // Jan 1 2001, Jan 1 2001, Feb 1 2001 (same day-of-month, new day).
        let messages = vec![
            msg(1, HOUR, true, None, Some("a")),
            msg(2, 2 * HOUR, true, None, Some("b")),
            msg(3, 31 * 24 * HOUR, true, None, Some("c")),
        ];
        let (html, _) = Harness::new(&[]).render(&messages);
        assert_eq!(html.matches("<h2>").count(), 2);
        assert!(html.contains("<h2>Monday, January 01, 2001</h2>"));
        assert!(html.contains("<h2>Thursday, February 01, 2001</h2>"));
    }

    #[test]
    fn owner_and_correspondent_sit_on_fixed_sides() {
        let messages = vec![
            msg(1, HOUR, true, None, Some("mine")),
            msg(2, 2 * HOUR, false, Some("+1555"), Some("theirs")),
        ];
        let (html, _) = Harness::new(&["Alex"]).render(&messages);
        let mine = html.find("mine").unwrap();
        let theirs = html.find("theirs").unwrap();
        let left = html.find("text-align:left").unwrap();
        let right = html.find("text-align:right").unwrap();
        assert!(left < mine && mine < right && right < theirs);
        assert!(html.contains("<small>Me</small>"));
        assert!(html.contains("<small>Alex</small>"));
    }

    #[test]
    fn time_footer_uses_twelve_hour_clock() {
        let messages = vec![msg(1, 13 * HOUR + 5 * 60 * NS + 9 * NS, true, None, Some("x"))];
        let (html, _) = Harness::new(&[]).render(&messages);
        assert!(html.contains("<small>01:05:09 PM</small><br>\n</p>"));
    }

    #[test]
    fn each_correspondent_is_named_once() {
        let messages = vec![
            msg(1, HOUR, false, Some("+1555"), Some("one")),
            msg(2, 2 * HOUR, false, Some("b@example.com"), Some("two")),
            msg(3, 3 * HOUR, true, None, Some("three")),
            msg(4, 4 * HOUR, false, Some("+1555"), Some("four")),
        ];
        let mut h = Harness::new(&["Alex", "Blair"]);
        let (html, _) = h.render(&messages);

        assert_eq!(
            h.prompter.questions,
            vec![
                "Enter a name for user \"+1555\": ".to_string(),
                "Enter a name for user \"b@example.com\": ".to_string(),
            ]
        );
        assert_eq!(html.matches("<small>Alex</small>").count(), 2);
        assert_eq!(html.matches("<small>Blair</small>").count(), 1);
        assert_eq!(h.names.len(), 2);
    }

    #[test]
    fn seeded_names_are_not_asked_again() {
        let mut h = Harness::new(&[]);
        let seeded = HashMap::from([("+1555".to_string(), "Alex".to_string())]);
        h.names = NameBook::with_names(seeded);
        let (html, _) = h.render(&[msg(1, HOUR, false, Some("+1555"), Some("hey"))]);
        assert!(h.prompter.questions.is_empty());
        assert!(html.contains("<small>Alex</small>"));
    }

    #[test]
    fn text_and_names_are_escaped() {
        let mut h = Harness::new(&["<Sam & \"Co\">"]);
        let text = "<script>alert('x')</script>";
        let (html, _) = h.render(&[msg(1, HOUR, false, Some("+1555"), Some(text))]);
        assert!(html.contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;<br>"));
        assert!(html.contains("<small>&lt;Sam &amp; &quot;Co&quot;&gt;</small>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn attachments_are_copied_with_increasing_names() {
        let mut h = Harness::new(&["Alex"]);
        let photo = h.source_file("photo.jpg", b"jpeg");
        let clip = h.source_file("clip.MOV", b"mov");
        let messages = vec![
            with_attachment(msg(1, HOUR, false, Some("+1555"), Some("\u{FFFC}")), &photo),
            with_attachment(msg(2, 2 * HOUR, true, None, Some("look")), &clip),
        ];
        let (html, summary) = h.render(&messages);

        let dir = h.dir.path().join("attachments");
        assert_eq!(fs::read(dir.join("0.jpg")).unwrap(), b"jpeg");
        assert_eq!(fs::read(dir.join("1.MOV")).unwrap(), b"mov");
        assert_eq!(summary.attachments_copied, 2);
        assert_eq!(h.sink.copied(), 2);

        assert!(html.contains("<a href=\"attachments/0.jpg\">Attachment</a><br>"));
        assert!(html.contains("<a href=\"attachments/1.MOV\">Attachment</a><br>"));
        assert!(!html.contains('\u{FFFC}'));
        assert!(html.contains("look<br>"));
    }

    #[test]
    fn placeholder_only_text_is_suppressed() {
        assert!(is_placeholder_only("\u{FFFC}"));
        assert!(is_placeholder_only("\u{FFFC}\u{FFFC} "));
        assert!(!is_placeholder_only("\u{FFFC} caption"));
        assert!(!is_placeholder_only(" "));
    }

    #[test]
    fn placeholder_without_attachment_is_kept() {
        let lone = msg(1, HOUR, true, None, Some("\u{FFFC}"));
        let (html, summary) = Harness::new(&[]).render(&[lone]);
        assert_eq!(summary.messages, 1);
        assert!(html.contains("\u{FFFC}<br>"));
    }

    #[test]
    fn links_are_relative_to_the_transcript_folder() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photo.png");
        fs::write(&source, b"png").unwrap();

        let transcript_dir = dir.path().join("exports");
        let mut sink = AttachmentSink::create(&dir.path().join("media/files"), &transcript_dir)
            .unwrap();
        let outcome = sink.materialize(&source.to_string_lossy()).unwrap();
        assert_eq!(
            outcome,
            AttachmentOutcome::Copied {
                href: "../media/files/0.png".to_string()
            }
        );
        assert_eq!(fs::read(dir.path().join("media/files/0.png")).unwrap(), b"png");
    }

    #[test]
    fn missing_attachment_renders_a_notice_and_continues() {
        let mut h = Harness::new(&["Alex"]);
        let gone = h.dir.path().join("gone <1>.png").to_string_lossy().into_owned();
        let photo = h.source_file("photo.jpg", b"jpeg");
        let messages = vec![
            with_attachment(msg(1, HOUR, false, Some("+1555"), Some("broken")), &gone),
            with_attachment(msg(2, 2 * HOUR, false, Some("+1555"), None), &photo),
            msg(3, 3 * HOUR, true, None, Some("after")),
        ];
        let (html, summary) = h.render(&messages);

        assert!(html.contains(&format!(
            "<i>Attachment not found: {}</i><br>",
            escape_html(&gone)
        )));
        assert!(html.contains("broken<br>"));
        assert!(html.contains("after<br>"));
        assert_eq!(summary.messages, 3);
        assert_eq!(summary.attachments_missing, 1);
        assert!(h.dir.path().join("attachments/0.jpg").exists());
    }

    #[test]
    fn plugin_payloads_are_not_copied() {
        let mut h = Harness::new(&[]);
        let payload = h.source_file("preview.pluginPayloadAttachment", b"blob");
        let (html, summary) = h.render(&[with_attachment(
            msg(1, HOUR, true, None, Some("https://example.com")),
            &payload,
        )]);
        assert_eq!(summary.attachments_skipped, 1);
        assert!(!html.contains("<a href"));
        assert!(html.contains("https://example.com<br>"));
        assert_eq!(fs::read_dir(h.dir.path().join("attachments")).unwrap().count(), 0);
    }

    #[test]
    fn rows_of_one_message_form_one_block() {
        let mut h = Harness::new(&[]);
        let a = h.source_file("a.jpg", b"a");
        let b = h.source_file("b.jpg", b"b");
        let base = msg(1, HOUR, true, None, Some("two pics"));
        let messages = vec![with_attachment(base.clone(), &a), with_attachment(base, &b)];
        let (html, summary) = h.render(&messages);

        assert_eq!(summary.messages, 1);
        assert_eq!(summary.attachments_copied, 2);
        assert_eq!(html.matches("<p style=").count(), 1);
        assert_eq!(html.matches("two pics").count(), 1);
    }

    #[test]
    fn blocks_follow_input_order() {
        let messages: Vec<_> = (1..=4)
            .map(|k| msg(k, k * HOUR, true, None, Some(&format!("msg-{}", k))))
            .collect();
        let (html, _) = Harness::new(&[]).render(&messages);
        let positions: Vec<_> = (1..=4)
            .map(|k| html.find(&format!("msg-{}<br>", k)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn handle_zero_without_identifier_is_the_owner() {
        let m = msg(1, HOUR, false, None, Some("from another device"));
        let (html, _) = Harness::new(&[]).render(&[m]);
        assert!(html.contains("text-align:left"));
        assert!(html.contains("<small>Me</small>"));
    }

    #[test]
    fn existing_attachment_dir_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = AttachmentSink::create(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ExportError::AttachmentsDirExists(_)));
    }
}
