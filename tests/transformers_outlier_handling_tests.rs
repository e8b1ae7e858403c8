mod common;

use approx::assert_relative_eq;
use common::*;
use farm_load::exceptions::{FarmLoadError, FarmLoadResult};
use farm_load::processing::fit_capper;
use farm_load::settings::PipelineSettings;
use farm_load::transformers::outlier_handling::OutlierCapper;

async fn training_df() -> datafusion::prelude::DataFrame {
    create_df(vec![
        ("well_count", floats(&[1.0, 2.0, 3.0, 4.0, 100.0])),
        ("activity_count", ints(&[1, 2, 3, 4, 500])),
    ])
    .await
}

#[tokio::test]
async fn test_capper_clips_to_iqr_bounds() -> FarmLoadResult<()> {
    let df = training_df().await;
    let mut capper = OutlierCapper::new(vec!["well_count".to_string()], 1.5);
    capper.fit(&df).await?;

    // Q1 = 2, Q3 = 4, IQR = 2
    let bounds = capper.bounds["well_count"];
    assert_relative_eq!(bounds.lower, -1.0);
    assert_relative_eq!(bounds.upper, 7.0);

    let batch = collect_batch(capper.transform(df)?).await;
    assert_eq!(values(&batch, "well_count"), vec![1.0, 2.0, 3.0, 4.0, 7.0]);
    // Columns not configured are untouched.
    assert_eq!(
        values(&batch, "activity_count"),
        vec![1.0, 2.0, 3.0, 4.0, 500.0]
    );
    Ok(())
}

#[tokio::test]
async fn test_capping_is_idempotent() -> FarmLoadResult<()> {
    let df = training_df().await;
    let mut capper = OutlierCapper::new(
        vec!["well_count".to_string(), "activity_count".to_string()],
        1.5,
    );
    capper.fit(&df).await?;

    let once = capper.transform(df)?;
    let twice = capper.transform(once.clone())?;
    let once = collect_batch(once).await;
    let twice = collect_batch(twice).await;
    assert_eq!(values(&once, "well_count"), values(&twice, "well_count"));
    assert_eq!(
        values(&once, "activity_count"),
        values(&twice, "activity_count")
    );
    Ok(())
}

#[tokio::test]
async fn test_bounds_are_not_refitted_on_new_data() -> FarmLoadResult<()> {
    let mut capper = OutlierCapper::new(vec!["well_count".to_string()], 1.5);
    capper.fit(&training_df().await).await?;

    let later = create_df(vec![("well_count", floats(&[-10.0, 5.0, 50.0]))]).await;
    let batch = collect_batch(capper.transform(later)?).await;
    assert_eq!(values(&batch, "well_count"), vec![-1.0, 5.0, 7.0]);
    Ok(())
}

#[tokio::test]
async fn test_nulls_are_ignored_and_preserved() -> FarmLoadResult<()> {
    let df = create_df(vec![(
        "property_area",
        opt_floats(&[Some(1.0), None, Some(2.0), Some(3.0), Some(4.0), Some(100.0)]),
    )])
    .await;
    let mut capper = OutlierCapper::new(vec!["property_area".to_string()], 1.5);
    capper.fit(&df).await?;
    let batch = collect_batch(capper.transform(df)?).await;
    assert_eq!(
        f64_column(&batch, "property_area"),
        vec![Some(1.0), None, Some(2.0), Some(3.0), Some(4.0), Some(7.0)]
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_column_is_insufficient() -> FarmLoadResult<()> {
    let df = create_df(vec![("property_area", opt_floats(&[None, None]))]).await;
    let mut capper = OutlierCapper::new(vec!["property_area".to_string()], 1.5);
    assert!(matches!(
        capper.fit(&df).await,
        Err(FarmLoadError::InsufficientData(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_negative_factor_is_rejected() -> FarmLoadResult<()> {
    let mut capper = OutlierCapper::new(vec!["well_count".to_string()], -1.0);
    assert!(matches!(
        capper.fit(&training_df().await).await,
        Err(FarmLoadError::InvalidParameter(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_transform_before_fit_fails() -> FarmLoadResult<()> {
    let capper = OutlierCapper::new(vec!["well_count".to_string()], 1.5);
    assert!(matches!(
        capper.transform(training_df().await),
        Err(FarmLoadError::NotFitted(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_nan_is_left_alone() -> FarmLoadResult<()> {
    let mut capper = OutlierCapper::new(vec!["well_count".to_string()], 1.5);
    capper.fit(&training_df().await).await?;

    let later = create_df(vec![("well_count", floats(&[f64::NAN, 2.0, 50.0]))]).await;
    let capped = values(&collect_batch(capper.transform(later)?).await, "well_count");
    assert!(capped[0].is_nan());
    assert_eq!(&capped[1..], &[2.0, 7.0]);
    Ok(())
}

#[tokio::test]
async fn test_capper_settings_drive_fitted_bounds() -> FarmLoadResult<()> {
    let df = training_df().await;
    let defaults = PipelineSettings::from_json_str(r#"{ "capper": { "columns": ["well_count"] } }"#)?;
    let default_capper = fit_capper(&df, &defaults.capper).await?;
    assert_relative_eq!(default_capper.bounds["well_count"].upper, 7.0);

    let wider = PipelineSettings::from_json_str(
        r#"{ "capper": { "columns": ["well_count"], "factor": 3.0 } }"#,
    )?;
    let capper = fit_capper(&df, &wider.capper).await?;
    assert_eq!(capper.factor, 3.0);
    assert_eq!(capper.columns, vec!["well_count".to_string()]);
    // Q1 = 2, Q3 = 4, IQR = 2
    assert_relative_eq!(capper.bounds["well_count"].lower, -4.0);
    assert_relative_eq!(capper.bounds["well_count"].upper, 10.0);

    let batch = collect_batch(capper.transform(df)?).await;
    assert_eq!(values(&batch, "well_count"), vec![1.0, 2.0, 3.0, 4.0, 10.0]);
    Ok(())
}

#[tokio::test]
async fn test_default_capper_settings_need_design_matrix_columns() -> FarmLoadResult<()> {
    let result = fit_capper(&training_df().await, &PipelineSettings::default().capper).await;
    assert!(matches!(result, Err(FarmLoadError::MissingColumn(_))));
    Ok(())
}
