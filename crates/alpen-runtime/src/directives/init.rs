#![forbid(unsafe_code)]

use alpen_reactive::untracked;

use crate::directive::{Directive, DirectiveContext};
use crate::error::RuntimeError;

/// `x-init`: evaluates its expression once, without subscribing.
pub(crate) struct InitDirective;

impl Directive for InitDirective {
    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        untracked(|| cx.evaluate()).map(drop)
    }
}
