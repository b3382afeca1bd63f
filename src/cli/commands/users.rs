use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::{app_state, OutputFormat};
use crate::database::models::Role;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user account")]
    Create {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        #[arg(long, help = "At least 8 characters")]
        password: String,

        #[arg(long, help = "Grant the ADMIN role")]
        admin: bool,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create {
            email,
            name,
            password,
            admin,
        } => {
            let role = if admin { Role::Admin } else { Role::User };
            let user = app_state()?.auth().create_user(&email, &name, &password, role).await?;

            output_success(
                output_format,
                &format!("Created {} user {}", user.role, user.email),
                Some(json!({ "user": user })),
            )
        }
    }
}
