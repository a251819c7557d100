mod common;

use anyhow::Result;
use common::{Group, test_service};
use splitledger::application::AppError;

#[tokio::test]
async fn test_dinner_split_three_ways() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;
    assert_eq!((group.alice, group.bob, group.carol), (1, 2, 3));

    let result = service
        .record_expense("Dinner", 3000, group.alice, group.trip, &group.everyone())
        .await?;

    assert_eq!(result.share_cents, 1000);
    assert_eq!(result.residual_cents, 0);
    assert_eq!(result.shares.len(), 3);
    assert!(result.shares.iter().all(|s| s.share_cents == 1000));

    assert_eq!(service.balance_between(group.bob, group.alice).await?, Some(1000));
    assert_eq!(service.balance_between(group.carol, group.alice).await?, Some(1000));
    assert_eq!(service.balance_between(group.alice, group.alice).await?, None);
    assert_eq!(service.list_balances().await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_expense_is_persisted_with_shares() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    let result = service
        .record_expense("  Taxi ", 1500, group.bob, group.trip, &[group.alice, group.bob])
        .await?;

    let detail = service.get_expense(result.expense.id).await?;
    assert_eq!(detail.expense.description, "Taxi");
    assert_eq!(detail.expense.total_cents, 1500);
    assert_eq!(detail.expense.paid_by, group.bob);
    assert_eq!(detail.expense.trip_id, group.trip);

    let participants: Vec<_> = detail.shares.iter().map(|s| s.user_id).collect();
    assert_eq!(participants, vec![group.alice, group.bob]);
    assert!(detail.shares.iter().all(|s| s.share_cents == 750));

    Ok(())
}

#[tokio::test]
async fn test_repeated_expenses_accumulate() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    group.dinner(&service).await?;
    service
        .record_expense("Museum", 2400, group.alice, group.trip, &[group.bob, group.alice])
        .await?;

    assert_eq!(service.balance_between(group.bob, group.alice).await?, Some(2200));
    assert_eq!(service.balance_between(group.carol, group.alice).await?, Some(1000));

    Ok(())
}

#[tokio::test]
async fn test_payer_outside_participants() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    // Alice pays for Bob and Carol only
    service
        .record_expense("Tickets", 2000, group.alice, group.trip, &[group.bob, group.carol])
        .await?;

    assert_eq!(service.balance_between(group.bob, group.alice).await?, Some(1000));
    assert_eq!(service.balance_between(group.carol, group.alice).await?, Some(1000));

    Ok(())
}

#[tokio::test]
async fn test_payer_only_participant_creates_no_debt() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    let result = service
        .record_expense("Snacks", 500, group.carol, group.trip, &[group.carol])
        .await?;

    assert_eq!(result.shares.len(), 1);
    assert!(service.list_balances().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_uneven_split_keeps_residual() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    let result = service
        .record_expense("Coffee", 1000, group.alice, group.trip, &group.everyone())
        .await?;

    assert_eq!(result.share_cents, 333);
    assert_eq!(result.residual_cents, 1);
    assert_eq!(service.balance_between(group.bob, group.alice).await?, Some(333));
    assert_eq!(service.balance_between(group.carol, group.alice).await?, Some(333));

    Ok(())
}

#[tokio::test]
async fn test_directional_debts_are_not_netted() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    service
        .record_expense("Lunch", 1000, group.alice, group.trip, &[group.alice, group.bob])
        .await?;
    service
        .record_expense("Drinks", 600, group.bob, group.trip, &[group.alice, group.bob])
        .await?;

    assert_eq!(service.balance_between(group.bob, group.alice).await?, Some(500));
    assert_eq!(service.balance_between(group.alice, group.bob).await?, Some(300));

    Ok(())
}

#[tokio::test]
async fn test_empty_participants_rejected_without_writes() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    let result = service
        .record_expense("Ghost", 3000, group.alice, group.trip, &[])
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(service.list_expenses(None).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_invalid_expense_input_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    for total in [0, -100] {
        let result = service
            .record_expense("Bad", total, group.alice, group.trip, &group.everyone())
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    let duplicate = service
        .record_expense("Dup", 900, group.alice, group.trip, &[group.bob, group.bob])
        .await;
    assert!(matches!(duplicate, Err(AppError::Validation(_))));

    let too_small = service
        .record_expense("Crumbs", 2, group.alice, group.trip, &group.everyone())
        .await;
    assert!(matches!(too_small, Err(AppError::Validation(_))));

    assert!(service.list_expenses(None).await?.is_empty());
    assert!(service.list_balances().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unknown_participant_rolls_back_everything() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    // User 99 does not exist: the share insert fails after the expense row
    // and Bob's share were written.
    let result = service
        .record_expense("Hotel", 9000, group.alice, group.trip, &[group.bob, 99, group.carol])
        .await;

    assert!(matches!(result, Err(AppError::Store(_))));
    assert!(service.list_expenses(None).await?.is_empty());
    assert!(service.list_balances().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unknown_payer_or_trip_is_a_store_error() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;

    let unknown_payer = service
        .record_expense("Fuel", 4000, 42, group.trip, &[group.alice, group.bob])
        .await;
    assert!(matches!(unknown_payer, Err(AppError::Store(_))));

    let unknown_trip = service
        .record_expense("Fuel", 4000, group.alice, 42, &[group.alice, group.bob])
        .await;
    assert!(matches!(unknown_trip, Err(AppError::Store(_))));

    assert!(service.list_expenses(None).await?.is_empty());
    assert!(service.list_balances().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_list_expenses_by_trip() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let group = Group::create(&service).await?;
    let porto = service.create_trip("Porto").await?;

    group.dinner(&service).await?;
    service
        .record_expense("Train", 1200, group.alice, porto.id, &[group.alice, group.bob])
        .await?;
    service
        .record_expense("Tram", 600, group.carol, group.trip, &[group.carol, group.bob])
        .await?;

    let lisbon: Vec<_> = service
        .list_expenses(Some(group.trip))
        .await?
        .into_iter()
        .map(|e| e.description)
        .collect();
    assert_eq!(lisbon, vec!["Dinner", "Tram"]);

    assert_eq!(service.list_expenses(Some(porto.id)).await?.len(), 1);
    assert_eq!(service.list_expenses(None).await?.len(), 3);

    // Trips tag expenses but do not partition balances
    assert_eq!(service.balance_between(group.bob, group.alice).await?, Some(1600));

    Ok(())
}

#[tokio::test]
async fn test_get_missing_expense() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service.get_expense(7).await;
    assert!(matches!(result, Err(AppError::ExpenseNotFound(7))));

    Ok(())
}
