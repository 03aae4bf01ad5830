use std::borrow::Cow;

/// Line terminator used by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineEnding {
	/// `\n`
	#[default]
	Lf,
	/// `\r\n`
	CrLf,
}

impl LineEnding {
	/// Returns the terminator string.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Lf => "\n",
			Self::CrLf => "\r\n",
		}
	}

	/// Picks the terminator of the first line break in `text`, defaulting to LF.
	pub fn detect(text: &str) -> Self {
		match text.find('\n') {
			Some(idx) if idx > 0 && text.as_bytes()[idx - 1] == b'\r' => Self::CrLf,
			_ => Self::Lf,
		}
	}

	/// Rewrites every `\r\n`, lone `\r` and `\n` in `text` to this terminator.
	///
	/// Borrows when `text` already uses it throughout.
	pub fn normalize(self, text: &str) -> Cow<'_, str> {
		let uniform = match self {
			Self::Lf => !text.contains('\r'),
			Self::CrLf => {
				let bytes = text.as_bytes();
				bytes.iter().enumerate().all(|(i, &b)| match b {
					b'\r' => bytes.get(i + 1) == Some(&b'\n'),
					b'\n' => i > 0 && bytes[i - 1] == b'\r',
					_ => true,
				})
			}
		};
		if uniform {
			return Cow::Borrowed(text);
		}

		let mut out = String::with_capacity(text.len() + text.len() / 8);
		let mut chars = text.chars().peekable();
		while let Some(ch) = chars.next() {
			match ch {
				'\r' => {
					chars.next_if_eq(&'\n');
					out.push_str(self.as_str());
				}
				'\n' => out.push_str(self.as_str()),
				ch => out.push(ch),
			}
		}
		Cow::Owned(out)
	}
}
