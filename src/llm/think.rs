//! Removal of `<think>...</think>` reasoning blocks from streamed output.

/// Incrementally strips think blocks across arbitrary chunk boundaries.
#[derive(Debug, Default)]
pub struct ThinkTagStripper {
    in_think_block: bool,
    carry: String,
}

impl ThinkTagStripper {
    const OPEN: &'static str = "<think>";
    const CLOSE: &'static str = "</think>";

    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one increment and return the newly visible text.
    ///
    /// A short tail that could be the start of a tag is held back until the
    /// next call or [`ThinkTagStripper::finish`].
    pub fn push(&mut self, fragment: &str) -> String {
        self.carry.push_str(fragment);

        let mut visible = String::new();
        loop {
            if self.in_think_block {
                if let Some(end) = self.carry.find(Self::CLOSE) {
                    self.carry.drain(..end + Self::CLOSE.len());
                    self.in_think_block = false;
                    continue;
                }
                let cut = tag_prefix_start(&self.carry);
                self.carry.drain(..cut);
                break;
            }

            if let Some(start) = self.carry.find(Self::OPEN) {
                visible.push_str(&self.carry[..start]);
                self.carry.drain(..start + Self::OPEN.len());
                self.in_think_block = true;
                continue;
            }

            let cut = tag_prefix_start(&self.carry);
            visible.push_str(&self.carry[..cut]);
            self.carry.drain(..cut);
            break;
        }

        visible
    }

    /// Flush the held-back tail. Text inside an unterminated block is dropped.
    pub fn finish(&mut self) -> String {
        if self.in_think_block {
            self.carry.clear();
            return String::new();
        }
        std::mem::take(&mut self.carry)
    }
}

/// Start of a trailing partial `<think>`/`</think>` tag, or the text length
/// when the text cannot end inside a tag.
fn tag_prefix_start(text: &str) -> usize {
    match text.rfind('<') {
        Some(lt)
            if ThinkTagStripper::OPEN.starts_with(&text[lt..])
                || ThinkTagStripper::CLOSE.starts_with(&text[lt..]) =>
        {
            lt
        }
        _ => text.len(),
    }
}
