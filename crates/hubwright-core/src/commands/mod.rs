//! Chat command routing.
//!
//! Input is matched in order against sigil commands (`/help`), then intents
//! by stemmed-token Jaccard similarity, then a fallback handler.

mod builtin;
mod normalize;
mod router;

pub use builtin::{BotServices, parse_run_args, register_builtins, render_workflow_result};
pub use normalize::{StemmingNormalizer, TextNormalizer, jaccard};
pub use router::{
    CommandRouter, DEFAULT_INTENT_THRESHOLD, DEFAULT_SIGIL, Handler, RepoRef, RequestContext,
    UNRECOGNIZED_MESSAGE, handler,
};
