//! Per-clip follow-up operations on a finished run.
//!
//! Each card carries its own pending flags, so regenerate, rocket and share
//! requests on different clips run side by side. The lock is only held to
//! read or apply state, never across a request.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    backend::ShortsBackend,
    error::{AutoShortsError, Result},
    request::{DEFAULT_BG_COLOR, DEFAULT_FONT_SIZE, DEFAULT_TEXT_COLOR},
    types::{
        CaptionStyle, Clip, ClipOperation, Credentials, RegenerateRequest, RocketContent,
        RocketRequest, RocketResponse, SharePlatform, ShareRequest, ShareResponse,
    },
};

/// Caption settings for re-rendering one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenerateOptions {
    pub caption_style: CaptionStyle,
    pub text_color: String,
    pub bg_color: String,
    pub font_size: u32,
}

impl RegenerateOptions {
    pub fn for_style(caption_style: CaptionStyle) -> Self {
        Self {
            caption_style,
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            bg_color: DEFAULT_BG_COLOR.to_string(),
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl Default for RegenerateOptions {
    fn default() -> Self {
        Self::for_style(CaptionStyle::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Pending {
    regenerate: bool,
    rocket: bool,
    share: bool,
}

impl Pending {
    fn flag(&mut self, operation: ClipOperation) -> &mut bool {
        match operation {
            ClipOperation::Regenerate => &mut self.regenerate,
            ClipOperation::Rocket => &mut self.rocket,
            ClipOperation::Share => &mut self.share,
        }
    }
}

/// One result card: the clip plus whatever was generated for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipCard {
    pub clip: Clip,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rocket: Option<RocketContent>,
    #[serde(skip)]
    pending: Pending,
}

impl ClipCard {
    pub fn new(clip: Clip) -> Self {
        Self {
            clip,
            rocket: None,
            pending: Pending::default(),
        }
    }

    pub fn is_pending(&self, operation: ClipOperation) -> bool {
        match operation {
            ClipOperation::Regenerate => self.pending.regenerate,
            ClipOperation::Rocket => self.pending.rocket,
            ClipOperation::Share => self.pending.share,
        }
    }

    /// Caption to post: the platform caption from rocket content when
    /// present, otherwise the clip's own title/description/hashtags.
    pub fn share_caption(&self, platform: SharePlatform) -> String {
        self.rocket
            .as_ref()
            .map(|r| r.caption_for(platform))
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.clip.share_caption())
    }
}

#[derive(Debug, Default)]
struct PanelState {
    generation: u64,
    cards: Vec<ClipCard>,
}

impl PanelState {
    fn card_mut(&mut self, index: usize) -> Result<&mut ClipCard> {
        let len = self.cards.len();
        self.cards
            .get_mut(index)
            .ok_or(AutoShortsError::ClipNotFound { index, len })
    }
}

#[derive(Debug, Default)]
pub struct ResultsPanel {
    state: Mutex<PanelState>,
}

impl ResultsPanel {
    pub fn new(clips: Vec<Clip>) -> Self {
        Self::from_cards(clips.into_iter().map(ClipCard::new).collect())
    }

    pub fn from_cards(cards: Vec<ClipCard>) -> Self {
        Self {
            state: Mutex::new(PanelState {
                generation: 0,
                cards,
            }),
        }
    }

    /// Show a new session's clips. Responses to requests issued before the
    /// reset are dropped when they arrive.
    pub async fn reset(&self, clips: Vec<Clip>) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.cards = clips.into_iter().map(ClipCard::new).collect();
    }

    pub async fn cards(&self) -> Vec<ClipCard> {
        self.state.lock().await.cards.clone()
    }

    pub async fn clips(&self) -> Vec<Clip> {
        self.state
            .lock()
            .await
            .cards
            .iter()
            .map(|c| c.clip.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.cards.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Mark `operation` pending on a card and build its request.
    async fn claim<T>(
        &self,
        index: usize,
        operation: ClipOperation,
        build: impl FnOnce(&ClipCard) -> Result<T>,
    ) -> Result<(u64, T)> {
        let mut state = self.state.lock().await;
        let generation = state.generation;
        let card = state.card_mut(index)?;

        if card.is_pending(operation) {
            return Err(AutoShortsError::Busy(match operation {
                ClipOperation::Regenerate => "regenerate",
                ClipOperation::Rocket => "rocket",
                ClipOperation::Share => "share",
            }));
        }

        let request = build(&*card)?;
        *card.pending.flag(operation) = true;
        Ok((generation, request))
    }

    /// Clear the pending flag and hand the card to `apply`, unless the panel
    /// was reset in the meantime.
    async fn settle<T, R>(
        &self,
        generation: u64,
        index: usize,
        operation: ClipOperation,
        outcome: Result<T>,
        apply: impl FnOnce(&mut ClipCard, T) -> R,
    ) -> Result<R> {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!("Dropping stale {} response for clip {}", operation, index);
            return Err(AutoShortsError::Superseded(operation));
        }

        let card = state.card_mut(index)?;
        *card.pending.flag(operation) = false;

        match outcome {
            Ok(value) => Ok(apply(card, value)),
            Err(e) => {
                warn!("{} failed for clip {}: {}", operation, index, e);
                Err(AutoShortsError::ClipOperationFailed {
                    operation,
                    index,
                    reason: e.user_message(),
                })
            }
        }
    }

    /// Re-render captions for one clip and swap in the new media on success.
    pub async fn regenerate<B>(
        &self,
        backend: &B,
        index: usize,
        options: &RegenerateOptions,
    ) -> Result<Clip>
    where
        B: ShortsBackend + ?Sized,
    {
        let op = ClipOperation::Regenerate;
        let (generation, request) = self
            .claim(index, op, |card| {
                Ok(RegenerateRequest {
                    file_id: card.clip.source_file_id()?,
                    start_time: card.clip.start,
                    end_time: card.clip.end,
                    caption_style: options.caption_style,
                    custom_color: options.text_color.clone(),
                    custom_bg_color: options.bg_color.clone(),
                    custom_size: options.font_size,
                })
            })
            .await?;

        info!("Regenerating clip {} as {}", index, options.caption_style);
        let outcome = backend.regenerate(&request).await;

        self.settle(generation, index, op, outcome, |card, response| {
            card.clip.url = response.url;
            card.clip.path = response.path;
            card.clip.clone()
        })
        .await
    }

    /// Ask for promotional copy. The clip itself is left alone.
    pub async fn generate_rocket<B>(&self, backend: &B, index: usize) -> Result<RocketContent>
    where
        B: ShortsBackend + ?Sized,
    {
        let op = ClipOperation::Rocket;
        let (generation, request) = self
            .claim(index, op, |card| Ok(RocketRequest::for_clip(&card.clip)))
            .await?;

        let outcome = backend
            .generate_rocket(&request)
            .await
            .and_then(RocketResponse::into_content);

        self.settle(generation, index, op, outcome, |card, content| {
            card.rocket = Some(content.clone());
            content
        })
        .await
    }

    /// Publish one clip. `credentials` are consumed whatever the outcome.
    pub async fn share<B>(
        &self,
        backend: &B,
        index: usize,
        platform: SharePlatform,
        credentials: Credentials,
        caption: Option<String>,
    ) -> Result<ShareResponse>
    where
        B: ShortsBackend + ?Sized,
    {
        let op = ClipOperation::Share;
        let (generation, (video_path, caption)) = self
            .claim(index, op, |card| {
                let caption = caption.unwrap_or_else(|| card.share_caption(platform));
                Ok((card.clip.path.clone(), caption))
            })
            .await?;

        info!("Sharing clip {} to {}", index, platform);
        let request = ShareRequest {
            video_path,
            caption,
            credentials,
        };
        let outcome = backend
            .share(platform, request)
            .await
            .and_then(ShareResponse::accepted);

        self.settle(generation, index, op, outcome, |_, response| response)
            .await
    }
}
