use crate::{
    error::{AutoShortsError, Result},
    types::{Clip, RocketContent},
};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Parse `HH:MM:SS`, `MM:SS` or plain seconds into seconds.
///
/// Blank input means "not set".
pub fn parse_timecode(input: &str) -> Result<Option<f64>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let invalid = || AutoShortsError::Validation(format!("Invalid time: {}", trimmed));

    let seconds = if trimmed.contains(':') {
        let parts = trimmed
            .split(':')
            .map(|p| match p.trim().parse::<f64>() {
                Ok(n) if n.is_finite() && n >= 0.0 => Ok(n),
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>>>()?;
        match parts.as_slice() {
            [h, m, s] => h * 3600.0 + m * 60.0 + s,
            [m, s] => m * 60.0 + s,
            _ => return Err(invalid()),
        }
    } else {
        trimmed.parse::<f64>().map_err(|_| invalid())?
    };

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }

    Ok(Some(seconds))
}

/// Format a clip as a human-readable result card
pub fn format_clip_card(index: usize, clip: &Clip) -> String {
    let mut output = String::new();

    let title = clip.title.as_deref().unwrap_or("Untitled short");
    output.push_str(&format!(
        "#{} {} [{}–{}]\n",
        index + 1,
        title,
        format_timestamp(clip.start),
        format_timestamp(clip.end)
    ));
    output.push_str(&format!("   {}\n", clip.url));

    if !clip.reason.is_empty() {
        output.push_str(&format!("   Why: {}\n", clip.reason));
    }
    if let Some(description) = &clip.description {
        output.push_str(&format!("   {}\n", description));
    }
    if let Some(tags) = clip.hashtags.as_ref().filter(|t| !t.is_empty()) {
        output.push_str(&format!("   {}\n", tags.join(" ")));
    }

    output
}

pub fn format_rocket_content(content: &RocketContent) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", content.title));
    output.push_str(&content.description);
    output.push_str("\n\n");

    if !content.hashtags.is_empty() {
        output.push_str(&content.hashtags.join(" "));
        output.push_str("\n\n");
    }

    output.push_str("## Instagram caption\n\n");
    output.push_str(&content.caption_instagram);
    output.push_str("\n\n## YouTube caption\n\n");
    output.push_str(&content.caption_youtube);
    output.push('\n');

    output
}
