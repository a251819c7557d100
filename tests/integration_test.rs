mod common;

use anyhow::Result;
use common::{Group, test_service};
use splitledger::application::AppError;

#[tokio::test]
async fn test_register_and_list_users() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let alice = service.register_user("Alice", "alice@example.com").await?;
    let bob = service.register_user(" Bob ", "").await?;
    assert_eq!(alice.id, 1);
    assert_eq!(bob.id, 2);
    assert_eq!(bob.name, "Bob");

    let users: Vec<_> = service
        .list_users()
        .await?
        .into_iter()
        .map(|u| (u.name, u.contact))
        .collect();
    assert_eq!(
        users,
        vec![
            ("Alice".to_string(), "alice@example.com".to_string()),
            ("Bob".to_string(), String::new()),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_names_are_required() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert!(matches!(
        service.register_user("   ", "nobody@example.com").await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        service.create_trip("").await,
        Err(AppError::Validation(_))
    ));
    assert!(service.list_users().await?.is_empty());
    assert!(service.list_trips().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_create_and_list_trips() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let lisbon = service.create_trip("Lisbon").await?;
    let porto = service.create_trip("Porto").await?;
    assert_ne!(lisbon.id, porto.id);

    let names: Vec<_> = service
        .list_trips()
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["Lisbon", "Porto"]);

    Ok(())
}

#[tokio::test]
async fn test_trip_scenario_end_to_end() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    // Scenario A
    group.dinner(&service).await?;
    let balances: Vec<_> = service
        .list_balances()
        .await?
        .into_iter()
        .map(|b| (b.debtor_name, b.creditor_name, b.amount_cents))
        .collect();
    assert_eq!(
        balances,
        vec![
            ("Bob".to_string(), "Alice".to_string(), 1000),
            ("Carol".to_string(), "Alice".to_string(), 1000),
        ]
    );

    // Scenario B
    service.record_payment(group.bob, group.alice, 1000).await?;
    let balances = service.list_balances().await?;
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].debtor_id, group.carol);
    assert_eq!(balances[0].amount_cents, 1000);

    // Scenario C
    service.record_payment(group.carol, group.alice, 400).await?;
    assert_eq!(service.balance_between(group.carol, group.alice).await?, Some(600));

    // Scenario D
    assert!(matches!(
        service.record_payment(5, 9, 100).await,
        Err(AppError::NoSuchBalance { .. })
    ));

    // Scenario E
    assert!(matches!(
        service
            .record_expense("Nothing", 3000, group.alice, group.trip, &[])
            .await,
        Err(AppError::Validation(_))
    ));
    assert_eq!(service.list_expenses(None).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_list_balances_is_repeatable() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;
    group.dinner(&service).await?;
    service
        .record_expense("Bus", 900, group.bob, group.trip, &group.everyone())
        .await?;

    let first = service.list_balances().await?;
    let second = service.list_balances().await?;
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_user_summary() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;
    group.dinner(&service).await?;
    service
        .record_expense("Bus", 900, group.bob, group.trip, &group.everyone())
        .await?;

    let summary = service.user_summary().await?;
    let by_name: Vec<_> = summary
        .iter()
        .map(|p| (p.user.name.as_str(), p.owed_to, p.owes, p.net()))
        .collect();

    // Bob owes Alice 10.00; Alice and Carol owe Bob 3.00 each; Carol owes Alice 10.00
    assert_eq!(
        by_name,
        vec![
            ("Alice", 2000, 300, 1700),
            ("Bob", 600, 1000, -400),
            ("Carol", 0, 1300, -1300),
        ]
    );
    assert_eq!(summary.iter().map(|p| p.net()).sum::<i64>(), 0);

    Ok(())
}

#[tokio::test]
async fn test_data_survives_reconnect() -> Result<()> {
    let (service, temp) = test_service().await?;
    let group = Group::create(&service).await?;
    group.dinner(&service).await?;
    drop(service);

    let db_path = temp.path().join("test.db");
    let reopened = splitledger::application::LedgerService::connect(db_path.to_str().unwrap()).await?;

    assert_eq!(reopened.list_users().await?.len(), 3);
    assert_eq!(reopened.balance_between(group.bob, group.alice).await?, Some(1000));

    Ok(())
}

#[tokio::test]
async fn test_user_summary_reports_overflowing_totals() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    // Each edge fits, but Alice's combined credit does not
    service
        .record_expense("Yacht", i64::MAX, group.alice, group.trip, &[group.bob])
        .await?;
    service
        .record_expense("Coffee", 100, group.alice, group.trip, &[group.carol])
        .await?;

    let result = service.user_summary().await;
    assert!(matches!(result, Err(AppError::Store(_))));

    // Per-pair reads are unaffected
    assert_eq!(
        service.balance_between(group.bob, group.alice).await?,
        Some(i64::MAX)
    );

    Ok(())
}
