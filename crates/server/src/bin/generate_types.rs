//! Writes the TypeScript declarations for the API types to `shared/types.ts`.

use std::{env, fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        db::models::user::UserRole::decl(),
        db::models::user::User::decl(),
        db::models::user::UserSummary::decl(),
        db::models::item::LocalizedName::decl(),
        db::models::item::ItemName::decl(),
        db::models::item::ItemStat::decl(),
        db::models::item::SortOrder::decl(),
        db::models::armor::ArmorFilter::decl(),
        db::models::armor::ArmorListItem::decl(),
        db::models::artefact::ArtefactEffect::decl(),
        db::models::artefact::ArtefactFilter::decl(),
        db::models::artefact::ArtefactListItem::decl(),
        db::models::container::ContainerFilter::decl(),
        db::models::container::ContainerListItem::decl(),
        db::models::tag::TagUsage::decl(),
        db::models::build::BuildFilter::decl(),
        db::models::build::CreateBuild::decl(),
        db::models::build::UpdateBuild::decl(),
        db::models::build::BuildAuthor::decl(),
        db::models::build::BuildItem::decl(),
        db::models::build::BuildArtefactSlot::decl(),
        db::models::build::BuildDetails::decl(),
        services::services::auth::RegisterRequest::decl(),
        services::services::auth::LoginRequest::decl(),
        services::services::auth::UpdateProfileRequest::decl(),
        services::services::auth::ResetPasswordRequest::decl(),
        services::services::auth::AuthSession::decl(),
        services::services::auth::AccessToken::decl(),
        services::services::auth::PasswordResetTicket::decl(),
        services::services::build::LikeState::decl(),
        services::services::build::FavoriteState::decl(),
        services::services::item_source::ItemCategory::decl(),
        services::services::item_sync::CategorySyncReport::decl(),
        services::services::item_sync::SyncReport::decl(),
        services::services::item_sync::SyncStatus::decl(),
        server::routes::auth::MeResponse::decl(),
        server::routes::auth::RefreshRequest::decl(),
        server::routes::auth::LogoutRequest::decl(),
        server::routes::auth::ForgotPasswordRequest::decl(),
        server::routes::builds::LangQuery::decl(),
        server::routes::builds::PopularQuery::decl(),
        utils::response::ApiResponse::<()>::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| {
            if decl.trim_start().starts_with("export") {
                decl
            } else {
                format!("export {decl}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("// This file was generated by `generate_types`. Do not edit it by hand.\n\n{body}\n")
}

fn main() -> std::io::Result<()> {
    let check_mode = env::args().any(|arg| arg == "--check");
    let shared_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("shared/types.ts is up to date.");
            return Ok(());
        }
        eprintln!("shared/types.ts is stale. Run `cargo run --bin generate_types`.");
        std::process::exit(1);
    }

    fs::create_dir_all(&shared_path)?;
    fs::write(&types_path, generated)?;
    println!("Wrote {}", types_path.display());
    Ok(())
}
