//! Task-to-invoice reconciliation tests on the in-memory store.

mod common;

use chrono::{Duration, Utc};
use common::{date, reconciler, seed_completed_task, seed_customer, seed_task};
use invoicing_service::models::{InvoiceStatus, TaskStatus};
use invoicing_service::services::InvoicingError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn completed_task_becomes_draft_invoice_at_estimated_hours() {
    let reconciler = reconciler();
    let (customer, task) = seed_completed_task(&reconciler, dec!(349), dec!(3), None).await;

    let invoice = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .expect("Failed to create invoice");

    assert_eq!(invoice.hours, dec!(3));
    assert_eq!(invoice.hourly_rate, dec!(349));
    assert_eq!(invoice.total_amount, dec!(1047));
    assert_eq!(invoice.vat_amount, dec!(209.40));
    assert_eq!(invoice.net_amount, dec!(837.60));
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.customer_id, customer.customer_id);
    assert_eq!(invoice.customer_name, customer.name);
    assert_eq!(invoice.customer_address, customer.address);
    assert_eq!(invoice.task_date, date(2024, 3, 1));
    assert_eq!(invoice.due_date, invoice.issued_date + Duration::days(14));
    assert_eq!(invoice.paid_date, None);

    let task = reconciler.get_task(task.task_id).await.unwrap();
    assert!(task.invoice_generated);
    assert!(task.invoiced_utc.is_some());
}

#[tokio::test]
async fn actual_hours_take_precedence_over_estimate() {
    let reconciler = reconciler();
    let (_, task) = seed_completed_task(&reconciler, dec!(400), dec!(3), Some(dec!(2.5))).await;

    let invoice = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();

    assert_eq!(invoice.hours, dec!(2.5));
    assert_eq!(invoice.total_amount, dec!(1000));
}

#[tokio::test]
async fn invoice_number_uses_issue_date_and_four_digit_suffix() {
    let reconciler = reconciler();
    let (_, task) = seed_completed_task(&reconciler, dec!(349), dec!(2), None).await;

    let invoice = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();

    let prefix = format!("F-{}-", invoice.issued_date.format("%Y%m%d"));
    assert!(invoice.invoice_number.starts_with(&prefix));
    let suffix = &invoice.invoice_number[prefix.len()..];
    assert_eq!(suffix.len(), 4);
    assert!(suffix.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn task_cannot_be_invoiced_twice() {
    let reconciler = reconciler();
    let (_, task) = seed_completed_task(&reconciler, dec!(349), dec!(3), None).await;

    reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();
    let err = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap_err();

    assert!(matches!(err, InvoicingError::AlreadyInvoiced(id) if id == task.task_id));
    assert_eq!(reconciler.list_invoices(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_invoicing_of_one_task_yields_one_invoice() {
    let reconciler = reconciler();
    let (_, task) = seed_completed_task(&reconciler, dec!(349), dec!(3), None).await;

    let (first, second) = tokio::join!(
        reconciler.create_invoice_from_task(task.task_id),
        reconciler.create_invoice_from_task(task.task_id)
    );

    let successes = [first.is_ok(), second.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(reconciler.list_invoices(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unfinished_task_is_rejected() {
    let reconciler = reconciler();
    let customer = seed_customer(&reconciler, None).await;
    let task = seed_task(&reconciler, &customer, date(2024, 3, 1), dec!(3)).await;

    let err = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::TaskNotCompleted(_)));

    let task = reconciler.get_task(task.task_id).await.unwrap();
    assert!(!task.invoice_generated);
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let reconciler = reconciler();

    let err = reconciler
        .create_invoice_from_task(Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(matches!(err, InvoicingError::TaskOrCustomerNotFound));
    assert_eq!(err.to_string(), "Task or customer not found");
}

#[tokio::test]
async fn invoice_amounts_are_frozen_when_rate_changes() {
    let reconciler = reconciler();
    let (customer, task) = seed_completed_task(&reconciler, dec!(349), dec!(3), None).await;
    let invoice = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();

    let updated = reconciler
        .update_customer_rate(customer.customer_id, dec!(500))
        .await
        .unwrap();
    assert_eq!(updated.hourly_rate, dec!(500));

    let reread = reconciler.get_invoice(invoice.invoice_id).await.unwrap();
    assert_eq!(reread.hourly_rate, dec!(349));
    assert_eq!(reread.total_amount, dec!(1047));
}

#[tokio::test]
async fn marking_paid_records_todays_date() {
    let reconciler = reconciler();
    let (_, task) = seed_completed_task(&reconciler, dec!(349), dec!(3), None).await;
    let invoice = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();

    let sent = reconciler
        .update_invoice_status(invoice.invoice_id, InvoiceStatus::Sent)
        .await
        .unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);
    assert_eq!(sent.paid_date, None);

    let paid = reconciler
        .update_invoice_status(invoice.invoice_id, InvoiceStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert_eq!(paid.paid_date, Some(Utc::now().date_naive()));

    let reread = reconciler.get_invoice(invoice.invoice_id).await.unwrap();
    assert_eq!(reread.status, InvoiceStatus::Paid);
    assert_eq!(reread.paid_date, paid.paid_date);
}

#[tokio::test]
async fn overdue_invoice_can_still_be_paid() {
    let reconciler = reconciler();
    let (_, task) = seed_completed_task(&reconciler, dec!(349), dec!(1), None).await;
    let invoice = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();

    for status in [InvoiceStatus::Sent, InvoiceStatus::Overdue, InvoiceStatus::Paid] {
        let updated = reconciler
            .update_invoice_status(invoice.invoice_id, status)
            .await
            .unwrap();
        assert_eq!(updated.status, status);
    }
}

#[tokio::test]
async fn invalid_invoice_transitions_are_rejected() {
    let reconciler = reconciler();
    let (_, task) = seed_completed_task(&reconciler, dec!(349), dec!(1), None).await;
    let invoice = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();

    let err = reconciler
        .update_invoice_status(invoice.invoice_id, InvoiceStatus::Overdue)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InvoicingError::InvalidInvoiceTransition {
            from: InvoiceStatus::Draft,
            to: InvoiceStatus::Overdue
        }
    ));

    let err = reconciler
        .update_invoice_status(invoice.invoice_id, InvoiceStatus::Draft)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::InvalidInvoiceTransition { .. }));

    reconciler
        .update_invoice_status(invoice.invoice_id, InvoiceStatus::Paid)
        .await
        .unwrap();
    let err = reconciler
        .update_invoice_status(invoice.invoice_id, InvoiceStatus::Sent)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InvoicingError::InvalidInvoiceTransition {
            from: InvoiceStatus::Paid,
            ..
        }
    ));
}

#[tokio::test]
async fn deleting_invoice_reopens_task_for_invoicing() {
    let reconciler = reconciler();
    let (_, task) = seed_completed_task(&reconciler, dec!(349), dec!(3), None).await;
    let invoice = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();
    assert!(reconciler.list_invoiceable_tasks().await.unwrap().is_empty());

    reconciler.delete_invoice(invoice.invoice_id).await.unwrap();

    let task = reconciler.get_task(task.task_id).await.unwrap();
    assert!(!task.invoice_generated);
    assert_eq!(task.invoiced_utc, None);
    let invoiceable = reconciler.list_invoiceable_tasks().await.unwrap();
    assert_eq!(invoiceable.len(), 1);

    let again = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();
    assert_ne!(again.invoice_id, invoice.invoice_id);
}

#[tokio::test]
async fn paid_invoice_cannot_be_deleted() {
    let reconciler = reconciler();
    let (_, task) = seed_completed_task(&reconciler, dec!(349), dec!(3), None).await;
    let invoice = reconciler
        .create_invoice_from_task(task.task_id)
        .await
        .unwrap();
    reconciler
        .update_invoice_status(invoice.invoice_id, InvoiceStatus::Paid)
        .await
        .unwrap();

    let err = reconciler
        .delete_invoice(invoice.invoice_id)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::InvoicePaid));

    let task = reconciler.get_task(task.task_id).await.unwrap();
    assert!(task.invoice_generated);
}

#[tokio::test]
async fn deleting_unknown_invoice_is_not_found() {
    let reconciler = reconciler();
    let err = reconciler.delete_invoice(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, InvoicingError::NotFound("Invoice")));
}

#[tokio::test]
async fn invoiceable_tasks_are_completed_uninvoiced_and_latest_first() {
    let reconciler = reconciler();
    let customer = seed_customer(&reconciler, None).await;

    let early = seed_task(&reconciler, &customer, date(2024, 3, 1), dec!(2)).await;
    let late = seed_task(&reconciler, &customer, date(2024, 3, 8), dec!(2)).await;
    let planned = seed_task(&reconciler, &customer, date(2024, 3, 15), dec!(2)).await;
    let invoiced = seed_task(&reconciler, &customer, date(2024, 3, 4), dec!(2)).await;

    for task in [&early, &late, &invoiced] {
        reconciler
            .update_task_status(task.task_id, TaskStatus::Completed, None)
            .await
            .unwrap();
    }
    reconciler
        .create_invoice_from_task(invoiced.task_id)
        .await
        .unwrap();

    let ids: Vec<Uuid> = reconciler
        .list_invoiceable_tasks()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.task_id)
        .collect();
    assert_eq!(ids, vec![late.task_id, early.task_id]);
    assert!(!ids.contains(&planned.task_id));
}

#[tokio::test]
async fn list_invoices_filters_by_status_newest_first() {
    let reconciler = reconciler();
    let (_, first_task) = seed_completed_task(&reconciler, dec!(349), dec!(1), None).await;
    let (_, second_task) = seed_completed_task(&reconciler, dec!(349), dec!(2), None).await;

    let first = reconciler
        .create_invoice_from_task(first_task.task_id)
        .await
        .unwrap();
    let second = reconciler
        .create_invoice_from_task(second_task.task_id)
        .await
        .unwrap();
    reconciler
        .update_invoice_status(first.invoice_id, InvoiceStatus::Sent)
        .await
        .unwrap();

    let all: Vec<Uuid> = reconciler
        .list_invoices(None)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.invoice_id)
        .collect();
    assert_eq!(all, vec![second.invoice_id, first.invoice_id]);

    let sent = reconciler
        .list_invoices(Some(InvoiceStatus::Sent))
        .await
        .unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].invoice_id, first.invoice_id);
}

#[tokio::test]
async fn task_lifecycle_follows_transition_table() {
    let reconciler = reconciler();
    let customer = seed_customer(&reconciler, None).await;
    let task = seed_task(&reconciler, &customer, date(2024, 3, 1), dec!(3)).await;
    assert_eq!(task.status, TaskStatus::Planned);
    assert!(!task.invoice_generated);

    let started = reconciler
        .update_task_status(task.task_id, TaskStatus::InProgress, None)
        .await
        .unwrap();
    assert_eq!(started.status, TaskStatus::InProgress);
    assert_eq!(started.completed_utc, None);

    let done = reconciler
        .update_task_status(task.task_id, TaskStatus::Completed, Some(dec!(3.5)))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.actual_duration_hours, Some(dec!(3.5)));
    assert!(done.completed_utc.is_some());

    let err = reconciler
        .update_task_status(task.task_id, TaskStatus::Cancelled, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InvoicingError::InvalidTaskTransition {
            from: TaskStatus::Completed,
            to: TaskStatus::Cancelled
        }
    ));
}

#[tokio::test]
async fn actual_hours_only_accepted_on_completion() {
    let reconciler = reconciler();
    let customer = seed_customer(&reconciler, None).await;
    let task = seed_task(&reconciler, &customer, date(2024, 3, 1), dec!(3)).await;

    let err = reconciler
        .update_task_status(task.task_id, TaskStatus::InProgress, Some(dec!(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::Validation(_)));

    let err = reconciler
        .update_task_status(task.task_id, TaskStatus::Completed, Some(Decimal::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::Validation(_)));
}

#[tokio::test]
async fn customer_defaults_to_configured_rate() {
    let reconciler = reconciler();
    let customer = seed_customer(&reconciler, None).await;
    assert_eq!(customer.hourly_rate, dec!(349));

    let customers = reconciler.list_customers().await.unwrap();
    assert_eq!(customers.len(), 1);
}

#[tokio::test]
async fn customer_rate_must_be_positive() {
    let reconciler = reconciler();
    let customer = seed_customer(&reconciler, Some(dec!(300))).await;

    let err = reconciler
        .update_customer_rate(customer.customer_id, dec!(0))
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::Validation(_)));

    let err = reconciler
        .update_customer_rate(Uuid::new_v4(), dec!(100))
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::NotFound("Customer")));
}

#[tokio::test]
async fn task_requires_existing_customer_and_positive_estimate() {
    let reconciler = reconciler();
    let customer = seed_customer(&reconciler, None).await;

    let err = reconciler
        .create_task(invoicing_service::models::CreateTask {
            customer_id: Uuid::new_v4(),
            employee_id: None,
            scheduled_date: date(2024, 3, 1),
            start_time: chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            estimated_duration_hours: dec!(2),
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::NotFound("Customer")));

    let err = reconciler
        .create_task(invoicing_service::models::CreateTask {
            customer_id: customer.customer_id,
            employee_id: None,
            scheduled_date: date(2024, 3, 1),
            start_time: chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            estimated_duration_hours: dec!(0),
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::Validation(_)));
}

#[tokio::test]
async fn hours_and_rates_outside_stored_precision_are_rejected() {
    let reconciler = reconciler();
    let customer = seed_customer(&reconciler, None).await;

    for hours in [dec!(2.333), dec!(10000)] {
        let err = reconciler
            .create_task(invoicing_service::models::CreateTask {
                customer_id: customer.customer_id,
                employee_id: None,
                scheduled_date: date(2024, 3, 1),
                start_time: chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                estimated_duration_hours: hours,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)), "{}", hours);
    }
    assert!(reconciler.list_tasks(None).await.unwrap().is_empty());

    let task = seed_task(&reconciler, &customer, date(2024, 3, 1), dec!(9999.99)).await;
    let err = reconciler
        .update_task_status(task.task_id, TaskStatus::Completed, Some(dec!(0.004)))
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::Validation(_)));
    assert_eq!(
        reconciler.get_task(task.task_id).await.unwrap().status,
        TaskStatus::Planned
    );

    let err = reconciler
        .create_customer(invoicing_service::models::CreateCustomer {
            name: "Karin Holm".to_string(),
            address: "Vasagatan 3, Göteborg".to_string(),
            hourly_rate: Some(dec!(0.004)),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::Validation(_)));

    let err = reconciler
        .update_customer_rate(customer.customer_id, dec!(349.995))
        .await
        .unwrap_err();
    assert!(matches!(err, InvoicingError::Validation(_)));
    assert_eq!(
        reconciler
            .get_customer(customer.customer_id)
            .await
            .unwrap()
            .hourly_rate,
        dec!(349)
    );
}
