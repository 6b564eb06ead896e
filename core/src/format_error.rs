use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};

/// Formats an error together with its chain of sources, one numbered cause per line.
pub struct FormatError<'a, E: Error> {
  error: &'a E,
}

impl<'a, E: Error> FormatError<'a, E> {
  pub fn new(error: &'a E) -> Self {
    Self { error }
  }

  fn causes(&self) -> impl Iterator<Item=&'a (dyn Error + 'static)> {
    let mut next = self.error.source();
    std::iter::from_fn(move || {
      let cause = next?;
      next = cause.source();
      Some(cause)
    })
  }
}

impl<'a, E: Error> Display for FormatError<'a, E> {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.error)?;
    let causes: Vec<_> = self.causes().collect();
    if !causes.is_empty() {
      write!(f, "\n\nCaused by:")?;
      let multiple = causes.len() > 1;
      for (n, cause) in causes.into_iter().enumerate() {
        // Indent continuation lines so multi-line messages stay under their cause number.
        let message = cause.to_string().replace('\n', "\n       ");
        if multiple {
          write!(f, "\n{: >5}: {}", n, message)?;
        } else {
          write!(f, "\n    {}", message)?;
        }
      }
    }
    Ok(())
  }
}

impl<'a, E: Error> Debug for FormatError<'a, E> {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    if f.alternate() {
      return Debug::fmt(self.error, f);
    }
    Display::fmt(self, f)
  }
}


#[cfg(test)]
mod tests {
  use thiserror::Error;

  use super::*;

  #[derive(Debug, Error)]
  #[error("inner failure")]
  struct Inner;

  #[derive(Debug, Error)]
  #[error("middle failure")]
  struct Middle(#[source] Inner);

  #[derive(Debug, Error)]
  #[error("outer failure")]
  struct Outer(#[source] Middle);

  #[test]
  fn error_without_source_is_just_its_message() {
    assert_eq!(format!("{:?}", FormatError::new(&Inner)), "inner failure");
  }

  #[test]
  fn single_cause_is_indented() {
    let error = Middle(Inner);
    assert_eq!(format!("{:?}", FormatError::new(&error)), "middle failure\n\nCaused by:\n    inner failure");
  }

  #[test]
  fn multiple_causes_are_numbered() {
    let error = Outer(Middle(Inner));
    assert_eq!(
      format!("{:?}", FormatError::new(&error)),
      "outer failure\n\nCaused by:\n    0: middle failure\n    1: inner failure"
    );
  }
}
