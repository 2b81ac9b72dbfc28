use std::cmp::Ordering;

use anyhow::Result;
use messages_service::models::{
    classification::PredicateKind,
    message::{Category, Message, Priority, compare_ids, parse_go_live_date},
    validation::{dedupe_batch, validate_message_id},
};
use serde_json::json;

use crate::common::{date, ids, notification};

/// Test: Feed JSON maps onto the message model
#[tokio::test]
async fn test_message_deserializes_feed_fields() -> Result<()> {
    let message: Message = serde_json::from_value(json!({
        "id": "12",
        "title": "Exam timetable",
        "description": "Published today",
        "groups": ["students", "students", "staff"],
        "titleUrl": "https://titles/12",
        "priority": "high",
        "goLiveDate": "2024-05-01T08:00:00+02:00",
        "messageType": "announcement"
    }))?;

    assert_eq!(message.id, "12");
    assert_eq!(message.groups.len(), 2);
    assert_eq!(message.title_url(), Some("https://titles/12"));
    assert!(message.is_high_priority());
    assert_eq!(message.category, Category::Announcement);
    assert_eq!(message.go_live_date.to_rfc3339(), "2024-05-01T06:00:00+00:00");

    Ok(())
}

/// Test: `category` is accepted as an alias for `messageType`
#[tokio::test]
async fn test_category_alias() -> Result<()> {
    let message: Message = serde_json::from_value(json!({
        "id": "1",
        "goLiveDate": "2024-01-01",
        "category": "notification"
    }))?;

    assert_eq!(message.category, Category::Notification);
    assert_eq!(message.priority, Priority::Normal);

    Ok(())
}

/// Test: Unknown dates and categories are rejected
#[tokio::test]
async fn test_invalid_message_rejected() -> Result<()> {
    let bad_date = serde_json::from_value::<Message>(json!({
        "id": "1", "goLiveDate": "yesterday", "messageType": "notification"
    }));
    let bad_type = serde_json::from_value::<Message>(json!({
        "id": "1", "goLiveDate": "2024-01-01", "messageType": "banner"
    }));

    assert!(bad_date.is_err());
    assert!(bad_type.is_err());

    Ok(())
}

/// Test: Go-live dates accept offsets, zone-less date-times and plain dates
#[tokio::test]
async fn test_parse_go_live_date_formats() -> Result<()> {
    let midnight = date(2024, 2, 29);

    assert_eq!(parse_go_live_date("2024-02-29").map_err(anyhow::Error::msg)?, midnight);
    assert_eq!(
        parse_go_live_date("2024-02-29T00:00:00.000").map_err(anyhow::Error::msg)?,
        midnight
    );
    assert_eq!(
        parse_go_live_date(" 2024-02-29T00:00:00Z ").map_err(anyhow::Error::msg)?,
        midnight
    );
    assert!(parse_go_live_date("29/02/2024").is_err());

    Ok(())
}

/// Test: Empty audience URLs count as no rule
#[tokio::test]
async fn test_empty_urls_do_not_declare_rules() -> Result<()> {
    let message = notification("1").with_data_url("").with_title_url("");

    assert_eq!(message.data_url(), None);
    assert!(PredicateKind::Group.applies_to(&message));
    assert!(!PredicateKind::Data.applies_to(&message));
    assert!(!PredicateKind::Title.applies_to(&message));

    Ok(())
}

/// Test: Ids compare numerically when both are numbers
#[tokio::test]
async fn test_compare_ids() -> Result<()> {
    assert_eq!(compare_ids("9", "10"), Ordering::Less);
    assert_eq!(compare_ids("b", "a"), Ordering::Greater);
    assert_eq!(compare_ids("10", "9a"), Ordering::Less);
    assert_eq!(compare_ids("7", "7"), Ordering::Equal);

    Ok(())
}

/// Test: Batches keep the first message per id and drop invalid ids
#[tokio::test]
async fn test_dedupe_batch() -> Result<()> {
    let batch = vec![
        notification("1").with_title("kept"),
        notification("2"),
        notification("1").with_title("dropped"),
        notification("   "),
        notification("bad\nid"),
    ];

    let deduped = dedupe_batch(batch);

    assert_eq!(ids(&deduped), vec!["1", "2"]);
    assert_eq!(deduped[0].title, "kept");
    assert!(validate_message_id(&"x".repeat(201)).is_err());
    assert!(validate_message_id("ok-id").is_ok());

    Ok(())
}
