use std::collections::BTreeSet;

use cascade_form::{Page, Request, Response, ResponseOutcome, SelectOption, render_options};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseError, TestCaseResult};

const CASCADE_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/cascade_property_fuzz_test.txt";
const DEFAULT_CASCADE_PROPTEST_CASES: u32 = 128;

fn cascade_proptest_cases() -> u32 {
    std::env::var("CASCADE_FORM_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_CASCADE_PROPTEST_CASES)
}

fn option_value_strategy() -> BoxedStrategy<String> {
    vec(
        prop_oneof![
            Just('a'),
            Just('b'),
            Just('z'),
            Just('0'),
            Just('7'),
            Just(' '),
            Just('&'),
            Just('='),
            Just('+'),
            Just('%'),
            Just('?'),
            Just('"'),
            Just('<'),
            Just('é'),
            Just('ж'),
        ],
        1..=6,
    )
    .prop_map(|chars| chars.into_iter().collect())
    .boxed()
}

fn option_values_strategy() -> BoxedStrategy<Vec<String>> {
    vec(option_value_strategy(), 1..=5)
        .prop_map(|values| {
            values
                .into_iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
        .boxed()
}

fn page_with_operation_types(values: &[String]) -> Result<Page, TestCaseError> {
    let options: Vec<SelectOption> = std::iter::once(SelectOption::placeholder())
        .chain(
            values
                .iter()
                .enumerate()
                .map(|(index, value)| SelectOption::new(value.clone(), format!("Type {index}"))),
        )
        .collect();
    let html = format!(
        concat!(
            r#"<select id="id_operation_type">{}</select>"#,
            r#"<select id="id_category"><option value="">---------</option></select>"#,
            r#"<select id="id_subcategory"><option value="old">Old</option></select>"#,
        ),
        render_options(&options)
    );
    let mut page = Page::from_html(&html).map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    page.bind_reference_form()
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    Ok(page)
}

fn page_with_categories(values: &[String]) -> Result<Page, TestCaseError> {
    let options: Vec<SelectOption> = std::iter::once(SelectOption::placeholder())
        .chain(
            values
                .iter()
                .enumerate()
                .map(|(index, value)| SelectOption::new(value.clone(), format!("Category {index}"))),
        )
        .collect();
    let html = format!(
        concat!(
            r#"<select id="id_operation_type"><option value="sales">Sales</option></select>"#,
            r#"<select id="id_category">{}</select>"#,
            r#"<select id="id_subcategory"><option value="">---------</option></select>"#,
        ),
        render_options(&options)
    );
    let mut page = Page::from_html(&html).map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    page.bind_reference_form()
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    Ok(page)
}

fn categories_for(value: &str, values: &[String]) -> Vec<SelectOption> {
    let index = values.iter().position(|candidate| candidate == value);
    match index {
        Some(index) => vec![
            SelectOption::new(format!("{index}-1"), format!("Category {index} one")),
            SelectOption::new(format!("{index}-2"), format!("Category {index} two")),
        ],
        None => Vec::new(),
    }
}

fn assert_each_change_issues_one_request(values: &[String], picks: &[usize]) -> TestCaseResult {
    let mut page = page_with_operation_types(values)?;
    let mut current = String::new();

    for (step, pick) in picks.iter().enumerate() {
        let value = &values[pick % values.len()];
        let before = page.pending_requests().len();
        page.select("#id_operation_type", value)
            .map_err(|err| TestCaseError::fail(format!("step {step}: {err:?}")))?;
        let pending = page.pending_requests();

        if *value == current {
            prop_assert_eq!(pending.len(), before, "unchanged value issued a request");
            continue;
        }
        current = value.clone();

        prop_assert_eq!(pending.len(), before + 1, "step {}: {:?}", step, value);
        let issued = &pending[before];
        prop_assert_eq!(&issued.request.path, "/reference/ajax/load-categories/");
        prop_assert_eq!(issued.request.param("operation_type"), Some(value.as_str()));
        let reparsed = Request::parse(&issued.url())
            .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
        prop_assert_eq!(&reparsed, &issued.request);
    }
    Ok(())
}

fn assert_category_changes_request_subcategories(
    values: &[String],
    picks: &[usize],
) -> TestCaseResult {
    let mut page = page_with_categories(values)?;
    let mut current = String::new();

    for (step, pick) in picks.iter().enumerate() {
        // Slot 0 is the empty placeholder value.
        let value = match pick % (values.len() + 1) {
            0 => "",
            slot => values[slot - 1].as_str(),
        };
        let before = page.pending_requests().len();
        page.select("#id_category", value)
            .map_err(|err| TestCaseError::fail(format!("step {step}: {err:?}")))?;
        let pending = page.pending_requests();

        let changed = value != current;
        current = value.to_string();
        if !changed || value.is_empty() {
            prop_assert_eq!(pending.len(), before, "step {}: {:?} issued a request", step, value);
            continue;
        }

        prop_assert_eq!(pending.len(), before + 1, "step {}: {:?}", step, value);
        let issued = &pending[before];
        prop_assert_eq!(&issued.request.path, "/reference/ajax/load-subcategories/");
        prop_assert_eq!(issued.request.param("category"), Some(value));
        prop_assert_eq!(issued.request.query.len(), 1);
        let reparsed = Request::parse(&issued.url())
            .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
        prop_assert_eq!(&reparsed, &issued.request);
    }
    Ok(())
}

fn assert_latest_selection_wins(
    values: &[String],
    picks: &[usize],
    order: &[usize],
) -> TestCaseResult {
    let mut page = page_with_operation_types(values)?;
    for pick in picks {
        page.select("#id_operation_type", &values[pick % values.len()])
            .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    }

    let pending = page.pending_requests();
    let Some(latest) = pending.last().map(|request| request.id) else {
        return Ok(());
    };
    let mut remaining = pending;
    let mut applied = Vec::new();
    let mut cursor = 0usize;
    while !remaining.is_empty() {
        let index = order.get(cursor).copied().unwrap_or(0) % remaining.len();
        cursor += 1;
        let request = remaining.remove(index);
        let value = request.request.param("operation_type").unwrap_or_default();
        let body = render_options(&categories_for(value, values));
        let outcome = page
            .respond(request.id, Response::ok(body))
            .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
        match outcome {
            ResponseOutcome::Applied => applied.push(request.id),
            ResponseOutcome::Stale => {}
            ResponseOutcome::Failed(reason) => {
                prop_assert!(false, "response for {:?} failed: {}", value, reason);
            }
        }
    }

    prop_assert_eq!(applied, vec![latest]);
    let selected = page
        .value("#id_operation_type")
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    let categories = page
        .options("#id_category")
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    prop_assert_eq!(categories, categories_for(&selected, values));
    let subcategories = page
        .options("#id_subcategory")
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    prop_assert_eq!(subcategories, vec![SelectOption::placeholder()]);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: cascade_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(CASCADE_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn operation_type_changes_issue_exactly_one_request(
        values in option_values_strategy(),
        picks in vec(any::<usize>(), 1..=12),
    ) {
        assert_each_change_issues_one_request(&values, &picks)?;
    }

    #[test]
    fn category_changes_issue_one_request_unless_cleared(
        values in option_values_strategy(),
        picks in vec(any::<usize>(), 1..=12),
    ) {
        assert_category_changes_request_subcategories(&values, &picks)?;
    }

    #[test]
    fn latest_operation_type_wins_in_any_response_order(
        values in option_values_strategy(),
        picks in vec(any::<usize>(), 1..=8),
        order in vec(any::<usize>(), 0..=8),
    ) {
        assert_latest_selection_wins(&values, &picks, &order)?;
    }
}
