use async_trait::async_trait;
use git_push_hooks_services::HookName;
use push_data::CommitWindow;
use push_ref::{ReferenceChange, Revision, Tag};
use tokio::sync::OnceCell;

use super::{ChangeProcessor, Context};
use crate::Error;

/// Processes a change to a tag.
pub struct TagChangeProcessor<'a> {
    ctx: &'a Context<'a>,
    change: &'a ReferenceChange,
    tag: OnceCell<Option<Tag>>,
}

impl<'a> TagChangeProcessor<'a> {
    pub fn new(ctx: &'a Context<'a>, change: &'a ReferenceChange) -> Self {
        Self {
            ctx,
            change,
            tag: OnceCell::new(),
        }
    }

    /// The pushed tag, provided the tag ref still points at the pushed
    /// revision. Removed tags have none.
    async fn tag(&self) -> Result<Option<&Tag>, Error> {
        let new = match self.change.new_revision() {
            Some(new) => new,
            None => return Ok(None),
        };

        let tag = self
            .tag
            .get_or_try_init(|| async {
                let tag = self
                    .ctx
                    .services
                    .repository
                    .find_tag(self.change.name())
                    .await?;
                Ok::<_, Error>(tag.filter(|tag| tag.points_at(new)))
            })
            .await?;

        Ok(tag.as_ref())
    }
}

#[async_trait]
impl<'a> ChangeProcessor for TagChangeProcessor<'a> {
    fn context(&self) -> &Context<'_> {
        self.ctx
    }

    fn change(&self) -> &ReferenceChange {
        self.change
    }

    fn hook_name(&self) -> HookName {
        HookName::TagPush
    }

    async fn commit_window(&self) -> Result<CommitWindow, Error> {
        Ok(self
            .tag()
            .await?
            .and_then(|tag| tag.dereferenced_target.clone())
            .map(CommitWindow::single)
            .unwrap_or_default())
    }

    async fn commit_count(&self, window: &CommitWindow) -> Result<usize, Error> {
        Ok(window.len())
    }

    async fn event_message(&self) -> Result<Option<String>, Error> {
        Ok(self
            .tag()
            .await?
            .and_then(Tag::annotation)
            .map(String::from))
    }

    async fn checkout_sha(&self) -> Result<Option<Revision>, Error> {
        Ok(self
            .tag()
            .await?
            .and_then(|tag| tag.dereferenced_target.as_ref())
            .map(|commit| commit.id.clone()))
    }
}
