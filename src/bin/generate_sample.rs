use std::fs::File;

use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};

const HEADER: [&str; 17] = [
    "Curso",
    "Grupo",
    "Avaliación",
    "Tipo",
    "Cualif",
    "Cualif. numérica",
    "Código materia",
    "Abreviatura",
    "Materia",
    "Nome completo",
    "NIF",
    "Medida",
    "Ex/Val/Ren",
    "Núm. repetición",
    "Data nacemento",
    "Titor",
    "Asig.Pendente",
];

const COURSES: [(&str, &[&str], &[&str]); 4] = [
    ("1º ESO", &["A", "B"], &["1ª Av", "2ª Av", "Final"]),
    ("4º ESO", &["A", "B", "C"], &["1ª Av", "Final"]),
    ("1º Bac", &["A"], &["1ª Av", "Ord"]),
    ("2º Bac", &["A", "B"], &["Ord", "Ext"]),
];

const SUBJECTS: [&str; 6] = [
    "Bioloxía",
    "Educación Física",
    "Inglés",
    "Lingua Galega",
    "Matemáticas",
    "Xeografía e Historia",
];

const FIRST_NAMES: [&str; 8] = [
    "Ana", "Brais", "Uxía", "Óscar", "Noa", "Iago", "Sabela", "Martín",
];
const SURNAMES: [&str; 8] = [
    "Álvarez", "Castro", "Fernández", "López", "Núñez", "Pérez", "Rodríguez", "Vázquez",
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n.max(1)
    }
}

/// Grade text in export style: integer, or one decimal with a comma.
/// Roughly one grade in twelve is left blank.
fn grade_text(rng: &mut SimpleRng, ability: f64) -> String {
    if rng.next_f64() < 1.0 / 12.0 {
        return String::new();
    }
    let raw = (ability + (rng.next_f64() - 0.5) * 4.0).clamp(1.0, 10.0);
    if rng.next_f64() < 0.5 {
        format!("{}", raw.round() as u32)
    } else {
        format!("{raw:.1}").replace('.', ",")
    }
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let output_path = "sample_grades.txt";

    let file = File::create(output_path).context("creating output file")?;
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(QuoteStyle::Always)
        .from_writer(file);
    writer.write_record(HEADER).context("writing header")?;

    let mut lines = 0usize;
    for (course, groups, evaluations) in COURSES {
        for group in groups.iter().copied() {
            for n in 0..12 {
                let student = format!(
                    "{} {}, {}",
                    SURNAMES[rng.below(SURNAMES.len())],
                    SURNAMES[rng.below(SURNAMES.len())],
                    FIRST_NAMES[(n + rng.below(3)) % FIRST_NAMES.len()]
                );
                let ability = 2.0 + rng.next_f64() * 8.0;
                let measure = if rng.next_f64() < 0.1 { "Reforzo" } else { "" };
                let repeat = if rng.next_f64() < 0.15 { "1" } else { "0" };
                let pending = if ability < 4.0 { "Matemáticas" } else { "" };

                for evaluation in evaluations.iter().copied() {
                    for subject in SUBJECTS {
                        let grade = grade_text(&mut rng, ability);
                        let mut record = [""; 17];
                        record[0] = course;
                        record[1] = group;
                        record[2] = evaluation;
                        record[4] = &grade;
                        record[8] = subject;
                        record[9] = &student;
                        record[11] = measure;
                        record[13] = repeat;
                        record[16] = pending;
                        writer.write_record(record).context("writing record")?;
                        lines += 1;
                    }
                }
            }
        }
    }

    writer.flush().context("flushing output")?;
    println!("Wrote {lines} grade lines to {output_path}");
    Ok(())
}
