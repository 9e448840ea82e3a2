// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine public API integration tests.

use chrono::NaiveDate;
use ppe_ledger::{
    AssignmentQuery, Engine, LedgerError, NewEmployee, NewProduct, NewVariant, ProductUpdate,
    Recipient, SortField, SortOrder,
};
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn make_product(name: &str, category: &str, variants: &[(&str, u32)]) -> NewProduct {
    NewProduct {
        name: name.into(),
        category: category.into(),
        variants: variants
            .iter()
            .map(|(variant, on_hand)| NewVariant::new(*variant, *on_hand, 2))
            .collect(),
        min_stock_global: 5,
        last_purchase_date: date(2025, 1, 1),
        expiration_date: None,
        price_per_unit: dec!(10.00),
    }
}

fn on_hand(engine: &Engine, product: &str, variant: &str) -> u32 {
    engine
        .product_by_name(product)
        .and_then(|p| p.variant(variant).map(|v| v.on_hand))
        .unwrap()
}

#[test]
fn helmet_scenario() {
    let engine = Engine::new();
    engine
        .add_product(make_product("Helmet", "EPP", &[("Standard", 10)]))
        .unwrap();

    let mut plan = engine.plan_assignment("Helmet", ["Ana", "Luis"]).unwrap();
    plan.set_quantity("Ana", 2);
    plan.set_quantity("Luis", 2);
    let receipt = engine.commit_assignment(&plan, date(2025, 6, 1)).unwrap();

    assert_eq!(on_hand(&engine, "Helmet", "Standard"), 6);
    assert_eq!(receipt.records.len(), 2);
    let entries = engine.assignments();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert_eq!(entry.quantity, 2);
        assert_eq!(entry.equipment, "Helmet");
        assert_eq!(entry.category, "Standard");
        assert_eq!(entry.assignment_date, date(2025, 6, 1));
        assert_eq!(entry.renewal_date, None);
    }
}

#[test]
fn lookups_ignore_case_and_keep_stored_spelling() {
    let engine = Engine::new();
    engine
        .add_product(make_product("Guantes Nitrilo", "EPP", &[("Talla M", 5)]))
        .unwrap();

    let levels = engine
        .ledger()
        .debit_on_hand("  guantes NITRILO ", "talla m", 2)
        .unwrap();
    assert_eq!(levels.on_hand(), 3);

    engine
        .assign("Ana", "GUANTES nitrilo", "TALLA M", 1, date(2025, 2, 1), None)
        .unwrap();
    let entry = &engine.assignments()[0];
    assert_eq!(entry.equipment, "Guantes Nitrilo");
    assert_eq!(entry.category, "Talla M");

    assert_eq!(
        engine.add_product(make_product("GUANTES NITRILO", "EPP", &[("S", 1)])),
        Err(LedgerError::DuplicateProduct("GUANTES NITRILO".into()))
    );
}

#[test]
fn deleting_a_record_never_changes_stock() {
    let engine = Engine::new();
    engine
        .add_product(make_product("Botas", "EPP", &[("42", 4)]))
        .unwrap();
    let receipt = engine
        .assign("Ana", "Botas", "42", 3, date(2025, 3, 1), Some(12))
        .unwrap();
    assert_eq!(on_hand(&engine, "Botas", "42"), 1);

    let removed = engine.delete_assignment(receipt.records[0]).unwrap();
    assert_eq!(removed.recipient, Recipient::Person("Ana".into()));
    assert_eq!(on_hand(&engine, "Botas", "42"), 1);
    assert!(engine.assignments().is_empty());

    assert_eq!(
        engine.delete_assignment(receipt.records[0]),
        Err(LedgerError::RecordNotFound(receipt.records[0]))
    );
}

#[test]
fn employee_rename_rewrites_only_their_records() {
    let engine = Engine::new();
    engine
        .add_product(make_product("Casco", "EPP", &[("Std", 20)]))
        .unwrap();
    let ana = engine.add_employee(NewEmployee::named("Ana")).unwrap();
    engine.add_employee(NewEmployee::named("Ana María")).unwrap();

    engine.assign("Ana", "Casco", "Std", 1, date(2025, 1, 1), None).unwrap();
    engine.assign("Ana María", "Casco", "Std", 1, date(2025, 1, 2), None).unwrap();
    engine.assign("Ana", "Casco", "Std", 2, date(2025, 1, 3), None).unwrap();
    engine.record_waste("Casco", "Std", 1, date(2025, 1, 4)).unwrap();

    let renamed = engine
        .update_employee(
            ana,
            NewEmployee {
                name: "Ana Soto".into(),
                role: Some("Supervisora".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(renamed, 2);

    let register = engine.register();
    assert_eq!(register.count_for_person("Ana Soto"), 2);
    assert_eq!(register.count_for_person("Ana María"), 1);
    assert_eq!(register.count_for_person("Ana"), 0);
    assert_eq!(register.len(), 4);

    // Same name again: nothing to rewrite.
    let unchanged = engine
        .update_employee(ana, NewEmployee::named("Ana Soto"))
        .unwrap();
    assert_eq!(unchanged, 0);
}

#[test]
fn deleting_an_employee_keeps_history() {
    let engine = Engine::new();
    engine
        .add_product(make_product("Casco", "EPP", &[("Std", 5)]))
        .unwrap();
    let luis = engine.add_employee(NewEmployee::named("Luis")).unwrap();
    engine.assign("Luis", "Casco", "Std", 1, date(2025, 1, 1), None).unwrap();

    engine.delete_employee(luis).unwrap();
    assert!(engine.directory().is_empty());
    assert_eq!(engine.register().count_for_person("Luis"), 1);
}

#[test]
fn register_queries_filter_and_sort() {
    let engine = Engine::new();
    engine
        .add_product(make_product("Casco", "EPP", &[("Std", 20)]))
        .unwrap();
    engine
        .add_product(make_product("Lentes", "EPP", &[("Claros", 20)]))
        .unwrap();

    engine.assign("Luis", "Casco", "Std", 3, date(2025, 1, 5), None).unwrap();
    engine.assign("Ana", "Lentes", "Claros", 1, date(2025, 1, 2), Some(6)).unwrap();
    engine.assign("Luisa", "Lentes", "Claros", 2, date(2025, 1, 9), None).unwrap();

    let by_date = engine.query_assignments(&AssignmentQuery {
        sort: Some((SortField::Date, SortOrder::Descending)),
        ..Default::default()
    });
    let people: Vec<&str> = by_date.iter().map(|a| a.recipient.label()).collect();
    assert_eq!(people, vec!["Luisa", "Luis", "Ana"]);

    let lentes = engine.query_assignments(&AssignmentQuery {
        search: Some("lent".into()),
        sort: Some((SortField::Quantity, SortOrder::Ascending)),
        ..Default::default()
    });
    assert_eq!(lentes.len(), 2);
    assert_eq!(lentes[0].recipient.label(), "Ana");

    let luis = engine.query_assignments(&AssignmentQuery {
        person: Some("Luis".into()),
        search: Some("lentes".into()),
        ..Default::default()
    });
    assert_eq!(luis.len(), 1);
    assert_eq!(luis[0].equipment, "Casco");
}

#[test]
fn product_update_and_delete_keep_history() {
    let engine = Engine::new();
    let id = engine
        .add_product(make_product("Casco", "EPP", &[("Std", 5)]))
        .unwrap();
    engine.assign("Ana", "Casco", "Std", 1, date(2025, 1, 1), None).unwrap();

    engine
        .catalog()
        .update_product(
            id,
            ProductUpdate {
                name: Some("Casco Blanco".into()),
                price_per_unit: Some(dec!(12.5)),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(engine.product_by_name("casco blanco").is_some());
    assert!(engine.product_by_name("casco").is_none());
    assert_eq!(engine.assignments()[0].equipment, "Casco");

    engine.catalog().delete_product(id).unwrap();
    assert!(engine.products().is_empty());
    assert_eq!(engine.register().for_product(id).len(), 1);
    assert!(matches!(
        engine.ledger().credit_on_hand("Casco Blanco", "Std", 1),
        Err(LedgerError::UnknownCatalogReference { .. })
    ));
}

#[test]
fn category_tags_cascade_to_products() {
    let engine = Engine::new();
    engine
        .add_product(make_product("Alcohol", "Insumos", &[("1L", 5)]))
        .unwrap();
    engine
        .add_product(make_product("Jabón", "Insumos", &[("500ml", 5)]))
        .unwrap();

    let catalog = engine.catalog();
    assert_eq!(catalog.rename_category_tag("Insumos", "Higiene"), Ok(2));
    assert_eq!(engine.product_by_name("Alcohol").unwrap().category, "Higiene");

    assert_eq!(catalog.delete_category_tag("higiene"), Ok(2));
    assert_eq!(engine.product_by_name("Jabón").unwrap().category, "Generales");
    assert_eq!(
        catalog.delete_category_tag("Generales"),
        Err(LedgerError::ProtectedCategory("Generales".into()))
    );
}

#[test]
fn barcodes_are_unique_and_scannable() {
    let engine = Engine::new();
    let id = engine
        .add_product(NewProduct {
            variants: vec![NewVariant::new("Std", 3, 1).with_barcode("7801234")],
            ..make_product("Casco", "EPP", &[])
        })
        .unwrap();

    let handle = engine.catalog().find_by_barcode("7801234").unwrap();
    assert_eq!(handle.target.product_id, id);
    assert_eq!(handle.levels().on_hand(), 3);

    assert_eq!(
        engine.add_product(NewProduct {
            variants: vec![NewVariant::new("Std", 1, 1).with_barcode("7801234")],
            ..make_product("Lentes", "EPP", &[])
        }),
        Err(LedgerError::DuplicateBarcode("7801234".into()))
    );
    assert!(engine.product_by_name("Lentes").is_none());
}

#[test]
fn dashboard_summarizes_catalog() {
    let engine = Engine::new();
    engine
        .add_product(NewProduct {
            expiration_date: Some(date(2025, 6, 10)),
            ..make_product("Alcohol", "Insumos", &[("1L", 1)])
        })
        .unwrap();
    engine
        .add_product(make_product("Casco", "EPP", &[("Std", 9)]))
        .unwrap();
    engine.assign("Ana", "Casco", "Std", 2, date(2025, 3, 2), None).unwrap();

    let dashboard = engine.dashboard(date(2025, 6, 1));
    assert_eq!(dashboard.products, 2);
    assert_eq!(dashboard.total_units, 8);
    assert_eq!(dashboard.total_investment, dec!(80.00));
    assert_eq!(dashboard.low_stock.len(), 1);
    assert_eq!(dashboard.expiring.len(), 1);
    assert_eq!(dashboard.expiring[0].days_left, 9);
    assert_eq!(engine.units_assigned_by_month(2025)[2], 2);
}
