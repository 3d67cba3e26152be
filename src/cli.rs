use clap::{Parser, Subcommand};

use crate::clip::ShareOption;

#[derive(Parser)]
#[command(name = "pasteboardd", about = "System pasteboard broker and client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the pasteboard broker
    Serve {
        /// Identity of this device for share-scope checks
        #[arg(long, default_value = "local")]
        device_id: String,

        /// Bound on a delayed-rendering provider, in milliseconds (0 = wait forever)
        #[arg(long, default_value_t = 5000)]
        provider_timeout_ms: u64,
    },

    /// Talk to a running broker
    Client {
        /// Application identity to present in the handshake
        #[arg(long, default_value = "pasteboardd-cli")]
        app_id: String,

        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// Publish text
    Copy {
        text: String,

        /// Also attach an HTML representation
        #[arg(long)]
        html: Option<String>,

        /// Share scope: in_app, local_device, cross_device
        #[arg(long, default_value = "local_device")]
        share: ShareOption,

        /// Free-form clip tag
        #[arg(long)]
        tag: Option<String>,

        /// Never expose the clip to remote devices
        #[arg(long)]
        local_only: bool,
    },

    /// Publish a placeholder and render `text` when first pasted
    CopyDelayed {
        text: String,

        #[arg(long, default_value = "local_device")]
        share: ShareOption,
    },

    /// Print the current clip
    Paste {
        /// List every record instead of the primary text
        #[arg(long)]
        records: bool,
    },

    /// Exit 0 if the pasteboard has content (of `--mime-type`, if given)
    Has {
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Print the change count
    Count,

    /// Empty the pasteboard
    Clear,

    /// Change the share scope of the current clip
    Share { option: ShareOption },

    /// Print the change count after every write
    Watch,
}
