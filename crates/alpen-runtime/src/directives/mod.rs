#![forbid(unsafe_code)]

//! Built-in directives.
//!
//! | Kind | Priority | Immediate |
//! |------|----------|-----------|
//! | `data` | Scope | yes |
//! | `ref` | Reference | yes |
//! | `for`, `if` | Structural | no |
//! | `text`, `show`, `bind`, `on`, `cloak`, `init` | Presentational | no |

mod bind;
mod conditional;
mod content;
mod data;
mod init;
mod on;
mod refs;

use crate::loops::ForDirective;
use crate::runtime::Runtime;

pub(crate) fn register_builtins(runtime: &Runtime) {
    runtime.directive("data", data::DataDirective);
    runtime.directive("ref", refs::RefDirective);
    runtime.directive("for", ForDirective);
    runtime.directive("if", conditional::IfDirective);
    runtime.directive("text", content::TextDirective);
    runtime.directive("show", content::ShowDirective);
    runtime.directive("cloak", content::CloakDirective);
    runtime.directive("bind", bind::BindDirective);
    runtime.directive("on", on::OnDirective);
    runtime.directive("init", init::InitDirective);
}
