//! Text injector: deliver a value to the focused field.

use anyhow::Result;
use tracing::debug;

use crate::io::clock::Clock;
use crate::io::host::{Host, Key};
use crate::session::Session;

/// Type short text key by key; paste long text through the clipboard.
///
/// Empty text is a no-op. The clipboard is not restored afterwards.
pub fn inject<H: Host, C: Clock>(session: &Session<'_, H, C>, text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let chars = text.chars().count();
    if chars > session.config.paste_threshold_chars {
        debug!(chars, "pasting long value");
        session.host.set_clipboard(text)?;
        session.host.chord(Key::Control, Key::Char('v'))?;
        return session.pause(session.config.paste_settle());
    }

    debug!(chars, "typing short value");
    let interval = session.config.typing_interval();
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        session.host.type_text(ch.encode_utf8(&mut buf))?;
        session.pause(interval)?;
    }
    Ok(())
}
