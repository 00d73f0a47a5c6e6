#[macro_export]
macro_rules! training_example {
    ($id:expr, $(($token:expr, $label:expr),)*) => {{
        $crate::TrainingExample::new(
            $id,
            vec![$($token.to_string()),*],
            vec![$($crate::Label::from($label)),*],
        )
    }}
}
