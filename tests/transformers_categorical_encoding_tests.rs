mod common;

use common::*;
use farm_load::exceptions::{FarmLoadError, FarmLoadResult};
use farm_load::transformers::categorical_encoding::{expand, OneHotExpander};

#[tokio::test]
async fn test_indicators_replace_source_column() -> FarmLoadResult<()> {
    let df = create_df(vec![
        ("farm_id", strs(&["F1", "F1", "F2"])),
        ("irrigation_type", floats(&[3.0, 2.0, 3.0])),
    ])
    .await;
    let expanded = expand(df, &["irrigation_type".to_string()]).await?;
    let batch = collect_batch(expanded).await;

    assert_eq!(
        names(&batch),
        vec!["farm_id", "irrigation_type_2.0", "irrigation_type_3.0"]
    );
    assert_eq!(values(&batch, "irrigation_type_2.0"), vec![0.0, 1.0, 0.0]);
    assert_eq!(values(&batch, "irrigation_type_3.0"), vec![1.0, 0.0, 1.0]);
    Ok(())
}

#[tokio::test]
async fn test_each_row_has_exactly_one_indicator_set() -> FarmLoadResult<()> {
    let df = create_df(vec![("farming_season", floats(&[1.0, 2.0, 3.0, 2.0, 1.0]))]).await;
    let batch = collect_batch(expand(df, &["farming_season".to_string()]).await?).await;
    for row in 0..batch.num_rows() {
        let total: f64 = names(&batch)
            .iter()
            .map(|name| values(&batch, name)[row])
            .sum();
        assert_eq!(total, 1.0);
    }
    Ok(())
}

#[tokio::test]
async fn test_integer_codes_have_no_decimal_point() -> FarmLoadResult<()> {
    let df = create_df(vec![("well_is_active", ints(&[2, 1, 1]))]).await;
    let mut expander = OneHotExpander::new(vec!["well_is_active".to_string()]);
    expander.fit(&df).await?;
    assert_eq!(
        expander.indicator_names(),
        vec!["well_is_active_1", "well_is_active_2"]
    );
    let batch = collect_batch(expander.transform(df)?).await;
    assert_eq!(values(&batch, "well_is_active_1"), vec![0.0, 1.0, 1.0]);
    Ok(())
}

#[tokio::test]
async fn test_fitted_expander_keeps_training_columns() -> FarmLoadResult<()> {
    let train = create_df(vec![("farm_type", floats(&[1.0, 2.0, 11.0]))]).await;
    let mut expander = OneHotExpander::new(vec!["farm_type".to_string()]);
    expander.fit(&train).await?;

    // Codes unseen in this table still get an (all-zero) indicator; unseen codes map to none.
    let later = create_df(vec![("farm_type", floats(&[2.0, 7.0]))]).await;
    let batch = collect_batch(expander.transform(later)?).await;
    assert_eq!(
        names(&batch),
        vec!["farm_type_1.0", "farm_type_2.0", "farm_type_11.0"]
    );
    assert_eq!(values(&batch, "farm_type_1.0"), vec![0.0, 0.0]);
    assert_eq!(values(&batch, "farm_type_2.0"), vec![1.0, 0.0]);
    assert_eq!(values(&batch, "farm_type_11.0"), vec![0.0, 0.0]);
    Ok(())
}

#[tokio::test]
async fn test_transform_before_fit_fails() -> FarmLoadResult<()> {
    let df = create_df(vec![("farm_type", floats(&[1.0]))]).await;
    let expander = OneHotExpander::new(vec!["farm_type".to_string()]);
    assert!(matches!(
        expander.transform(df),
        Err(FarmLoadError::NotFitted(_))
    ));
    Ok(())
}
