//! Caption generation in SRT and ASS formats.
//!
//! One cue per scene with non-empty caption text, timed to the scene
//! boundaries. ASS output additionally carries per-word karaoke timing
//! and the burn-in style block the encoder reads.

use std::path::Path;

use reelforge_common::error::ReelforgeResult;
use reelforge_timeline_model::{CaptionStyle, Timeline};

/// Font sizes below this are treated as legacy point values and scaled
/// up to pixel magnitudes for the play resolution.
const LEGACY_FONT_SIZE_CEILING: u32 = 20;
const LEGACY_FONT_SCALE: u32 = 4;

/// Generate SRT caption content from timeline scenes. Scenes without
/// caption text are skipped, not emitted as empty cues; indices stay
/// sequential over the emitted cues.
pub fn build_srt(timeline: &Timeline) -> String {
    let mut output = String::new();
    let mut index = 1;

    for scene in &timeline.scenes {
        let Some(caption) = trimmed_caption(scene.caption.as_deref()) else {
            continue;
        };
        output.push_str(&format!("{index}\n"));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(scene.start),
            format_srt_time(scene.end()),
        ));
        output.push_str(caption);
        output.push_str("\n\n");
        index += 1;
    }

    output
}

/// Generate ASS caption content with per-word `\k` karaoke timing. The
/// scene's duration in centiseconds is split evenly across its words,
/// with the integer remainder spread over the leading words so the sum
/// matches the scene duration exactly.
pub fn build_ass(timeline: &Timeline) -> String {
    let style = normalize_style(&timeline.meta.caption_style);
    let (play_res_x, play_res_y) = timeline
        .meta
        .parse_resolution()
        .unwrap_or((1920, 1080));

    let primary = "&H00FFFFFF";
    let secondary = "&H008A8A8A";
    let outline = "&H00000000";
    let back = "&H64000000";
    let alignment = style.position.ass_alignment();

    let mut output = String::new();
    output.push_str("[Script Info]\n");
    output.push_str("ScriptType: v4.00+\n");
    output.push_str(&format!("PlayResX: {play_res_x}\n"));
    output.push_str(&format!("PlayResY: {play_res_y}\n"));
    output.push_str("WrapStyle: 2\n");
    output.push_str("ScaledBorderAndShadow: yes\n\n");
    output.push_str("[V4+ Styles]\n");
    output.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    output.push_str(&format!(
        "Style: Default,{},{},{primary},{secondary},{outline},{back},\
         0,0,0,0,100,100,0,0,1,2,0,{alignment},40,40,{},1\n\n",
        style.font, style.font_size, style.bottom_margin,
    ));
    output.push_str("[Events]\n");
    output.push_str(
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
    );

    for scene in &timeline.scenes {
        let Some(caption) = trimmed_caption(scene.caption.as_deref()) else {
            continue;
        };
        let words: Vec<&str> = caption.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        let total_cs = ((scene.duration * 100.0).round() as i64).max(1) as usize;
        let base_cs = (total_cs / words.len()).max(1);
        let remainder = total_cs.saturating_sub(base_cs * words.len());

        let text = words
            .iter()
            .enumerate()
            .map(|(idx, word)| {
                let cs = base_cs + usize::from(idx < remainder);
                format!("{{\\k{cs}}}{word}")
            })
            .collect::<Vec<_>>()
            .join(" ");

        output.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{text}\n",
            format_ass_time(scene.start),
            format_ass_time(scene.end()),
        ));
    }

    output
}

/// Rescale legacy point-size fonts so captions stay legible at full
/// play resolution. Style data written before the pixel-size switch
/// carries values like 12 that would render unreadably small.
pub fn normalize_style(style: &CaptionStyle) -> CaptionStyle {
    let mut style = style.clone();
    if style.font_size < LEGACY_FONT_SIZE_CEILING {
        style.font_size *= LEGACY_FONT_SCALE;
        style.line_spacing *= LEGACY_FONT_SCALE;
    }
    style
}

/// Collapse whitespace and wrap caption text for on-screen display.
/// Lines break at the last word that fits, preferring a trailing
/// punctuation boundary; text past the last allowed line is appended to
/// that line and truncated with an ellipsis if it overflows.
pub fn format_caption(text: &str, max_lines: usize, max_chars_per_line: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return String::new();
    }
    if max_chars_per_line == 0 {
        return normalized;
    }

    let line_budget = max_lines.max(1);
    let all_words: Vec<&str> = normalized.split(' ').collect();
    let mut words: &[&str] = &all_words;

    let mut lines: Vec<String> = Vec::new();
    while !words.is_empty() && lines.len() < line_budget {
        let count = best_break(words, max_chars_per_line);
        let mut line = words[..count].join(" ");
        if line.chars().count() > max_chars_per_line {
            line = truncate_chars(&line, max_chars_per_line).trim_end().to_string();
        }
        lines.push(line);
        words = &words[count..];
    }

    if !words.is_empty() {
        if let Some(last) = lines.last_mut() {
            let remainder = words.join(" ");
            let combined = if last.is_empty() {
                remainder
            } else {
                format!("{last} {remainder}")
            };
            *last = if combined.chars().count() > max_chars_per_line {
                let clipped = truncate_chars(&combined, max_chars_per_line.saturating_sub(1));
                format!("{}\u{2026}", clipped.trim_end_matches([' ', ',', ';', ':']))
            } else {
                combined
            };
        }
    }

    lines.join("\n").trim().to_string()
}

/// Count of leading words that fit within `max_chars`, preferring the
/// last word ending in sentence punctuation. Always at least 1 so an
/// oversized first word still produces a line.
fn best_break(words: &[&str], max_chars: usize) -> usize {
    let mut length = 0;
    let mut last_fit = 0;
    let mut last_punct = 0;

    for (idx, word) in words.iter().enumerate() {
        let extra = if idx == 0 {
            word.chars().count()
        } else {
            word.chars().count() + 1
        };
        if length + extra > max_chars {
            break;
        }
        length += extra;
        last_fit = idx + 1;
        if word.ends_with(['.', '!', '?', ',', ';', ':']) {
            last_punct = idx + 1;
        }
    }

    if last_punct > 0 {
        last_punct
    } else if last_fit > 0 {
        last_fit
    } else {
        1
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn trimmed_caption(caption: Option<&str>) -> Option<&str> {
    caption.map(str::trim).filter(|c| !c.is_empty())
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(secs: f64) -> String {
    let total_ms = (secs * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as ASS timestamp: H:MM:SS.cc
fn format_ass_time(secs: f64) -> String {
    let hours = (secs / 3600.0) as u64;
    let minutes = ((secs % 3600.0) / 60.0) as u64;
    let seconds = secs % 60.0;
    format!("{hours}:{minutes:02}:{seconds:05.2}")
}

/// Write the SRT document next to the render output.
pub fn write_srt_file(path: &Path, timeline: &Timeline) -> ReelforgeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, build_srt(timeline))?;
    Ok(())
}

/// Write the ASS document next to the render output.
pub fn write_ass_file(path: &Path, timeline: &Timeline) -> ReelforgeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, build_ass(timeline))?;
    Ok(())
}
