//! Chain persistence round trips through the key-value contract.

use taskchain::adapters::MemoryChainStore;
use taskchain::domain::models::chain::validate_chain;
use taskchain::domain::ports::chain_store::ChainStore;
use taskchain::recipes::{
    build_chat_chain, build_openai_chat_chain, chain_key, ChatChainParams, OPENAI_CHAT_CHAIN_ID,
    STANDARD_CHAT_CHAIN_ID,
};

#[tokio::test]
async fn test_seeded_chains_round_trip_by_value() {
    let store = MemoryChainStore::new();

    let chat = build_chat_chain(ChatChainParams {
        subject_id: "subject-7".to_string(),
        preferred_models: vec!["small-model".to_string(), "large-model".to_string()],
        provider: "local".to_string(),
    });
    let openai = build_openai_chat_chain("small-model", "local");

    validate_chain(&chat).unwrap();
    validate_chain(&openai).unwrap();

    store.put_chain(&chat).await.unwrap();
    store.put_chain(&openai).await.unwrap();

    let loaded = store
        .get_chain(STANDARD_CHAT_CHAIN_ID)
        .await
        .unwrap()
        .expect("chat chain stored");
    assert_eq!(loaded, chat);

    let loaded = store
        .get_chain(OPENAI_CHAT_CHAIN_ID)
        .await
        .unwrap()
        .expect("openai chain stored");
    assert_eq!(loaded, openai);

    let ids: Vec<String> = store
        .list_chains()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(
        ids,
        vec![
            STANDARD_CHAT_CHAIN_ID.to_string(),
            OPENAI_CHAT_CHAIN_ID.to_string()
        ]
    );
}

#[tokio::test]
async fn test_json_text_round_trip_preserves_equality() {
    let chain = build_chat_chain(ChatChainParams::default());
    let encoded = serde_json::to_string_pretty(&chain).unwrap();
    let decoded: taskchain::domain::models::chain::ChainDefinition =
        serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, chain);
}

#[test]
fn test_chain_key_prefix() {
    assert_eq!(chain_key("chat_chain"), "chain:chat_chain");
}
