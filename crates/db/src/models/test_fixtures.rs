use sqlx::SqlitePool;

use super::{
    armor::{Armor, UpsertArmor},
    artefact::{Artefact, ArtefactEffect, UpsertArtefact},
    container::{Container, UpsertContainer},
    item::LocalizedName,
    user::{CreateUser, User, UserRole},
};

fn ru_name(name: String) -> Vec<LocalizedName> {
    vec![LocalizedName {
        lang: "ru".into(),
        name,
    }]
}

pub async fn create_user(pool: &SqlitePool, username: &str) -> User {
    User::create(
        pool,
        &CreateUser {
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password_hash: format!("hash-of-{username}"),
            role: UserRole::User,
        },
    )
    .await
    .unwrap()
}

pub async fn seed_armor(pool: &SqlitePool, id: &str, rank: &str) {
    let mut conn = pool.acquire().await.unwrap();
    Armor::upsert(
        &mut conn,
        &UpsertArmor {
            id: id.to_string(),
            category: "armor/combat".into(),
            rank: Some(rank.to_string()),
            names: ru_name(format!("Броня {id}")),
            ..Default::default()
        },
    )
    .await
    .unwrap();
}

pub async fn seed_artefact(pool: &SqlitePool, id: &str, category: &str) {
    let mut conn = pool.acquire().await.unwrap();
    Artefact::upsert(
        &mut conn,
        &UpsertArtefact {
            id: id.to_string(),
            category: category.to_string(),
            names: ru_name(format!("Артефакт {id}")),
            effects: vec![ArtefactEffect {
                effect_key: "stalker.artefact_properties.factor.health_bonus".into(),
                min_value: 1.0,
                max_value: 3.0,
                is_threshold: false,
            }],
            ..Default::default()
        },
    )
    .await
    .unwrap();
}

pub async fn seed_container(pool: &SqlitePool, id: &str, capacity: Option<i64>) {
    let mut conn = pool.acquire().await.unwrap();
    Container::upsert(
        &mut conn,
        &UpsertContainer {
            id: id.to_string(),
            category: "containers".into(),
            capacity,
            names: ru_name(format!("Контейнер {id}")),
            ..Default::default()
        },
    )
    .await
    .unwrap();
}
