//! Login challenge rendering for a terminal.

use {
    qrcode::{Color, EcLevel, QrCode},
    stickerbot_channels::QrRenderer,
    tracing::{info, warn},
};

/// Light modules around the code so scanners can find its edges.
const QUIET_ZONE: usize = 2;

/// Prints the challenge as a QR code built from half-block characters, two
/// module rows per line of text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalQrRenderer;

impl TerminalQrRenderer {
    /// Render `data` as text. `None` if the payload does not fit a QR code.
    #[must_use]
    pub fn to_text(data: &str) -> Option<String> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L).ok()?;
        let width = code.width();
        let colors = code.into_colors();
        let is_dark = |row: usize, col: usize| -> bool {
            let (Some(r), Some(c)) = (row.checked_sub(QUIET_ZONE), col.checked_sub(QUIET_ZONE))
            else {
                return false;
            };
            r < width && c < width && colors[r * width + c] == Color::Dark
        };

        let side = width + QUIET_ZONE * 2;
        let mut out = String::with_capacity((side + 1) * side.div_ceil(2) * 3);
        for row in (0..side).step_by(2) {
            for col in 0..side {
                out.push(match (is_dark(row, col), is_dark(row + 1, col)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
            }
            out.push('\n');
        }
        Some(out)
    }
}

impl QrRenderer for TerminalQrRenderer {
    fn render(&self, challenge: &str) {
        match Self::to_text(challenge) {
            Some(text) => {
                // Printed verbatim; a log formatter would mangle the blocks.
                println!("{text}");
                info!("QR code generated, scan it with WhatsApp > Linked devices");
            },
            None => warn!(len = challenge.len(), "login challenge does not fit a QR code"),
        }
    }
}
