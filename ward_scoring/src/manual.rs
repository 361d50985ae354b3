/*!

This is the long-form manual for `ward_scoring` and `wardrank`.

## Input formats

### Statistics table

A table with one row per ward and one column per statistic. The first row names the
columns. It can be read from:
* a CSV file (`.csv`)
* an Excel worksheet (`.xlsx`), see `--excel-worksheet-name`

```text
Ward Code,Ward Name,LA Name,Population,Median age
E05000026,Abbey,Barking and Dagenham,12904,31
E05000027,Alibon,Barking and Dagenham,10468,34
```

Each row needs a unique, non-empty ward code (column `Ward Code` by default, see
`codeField`). Cells that read as numbers are numbers, everything else is text. Text
in a statistic column counts as 0 when scoring.

The identifier, name and administrative columns are not statistics and cannot be
weighted. The default list is:
`WD11CD`, `WD11CDO`, `WD11NM`, `WD11NMW`, `Ward Code`, `Ward Name`, `LA Name`,
`Region`, `Rurality`, `Constituency`, `Constituency Code`, `GE 2017`.

### Boundaries

A GeoJSON `FeatureCollection`. Each feature carries the code of its ward in one of its
properties (`WD11CD` by default, see `boundaryCodeProperty`). Wards without a boundary
are still ranked, they are simply missing from the joined features.

### Weights

A JSON object with one entry per statistic:

```text
{
  "Population": {"weight": 1.0, "mode": "normalized"},
  "Median age": {"weight": -0.5, "mode": "rank"}
}
```

The modes are:
* `value`: the raw value of the statistic
* `normalized`: the value rescaled to `[0, 1]` between the smallest and the largest value
  of the table
* `rank`: the position of the ward when sorting the table by this statistic, rescaled to
  `[0, 1]` (0 for the lowest value)

Statistics missing from the file get a weight of 0, entries for statistics that the
table does not have are dropped with a warning.

## Scores

The score of a ward is the sum of `weight x value` over all the statistics, with the
value selected by the mode. Weights may be negative. The wards are then sorted by
decreasing score: the first one gets rank 1. Wards with the same score keep the order
of the table.

The reported score is rescaled between the lowest and the highest score:
`(score - minScore) / (maxScore - minScore + 0.000001)`. When every ward has the same
score, `scoreRange` is `0.000001`, which means that there is nothing to compare.

## Configuration

`wardrank` accepts a configuration file in JSON. All the entries are optional and
command line flags take precedence.

```text
{
  "dataFile": "wards.csv",
  "boundariesFile": "wards.geojson",
  "weightsFile": "weights.json",
  "codeField": "Ward Code",
  "boundaryCodeProperty": "WD11CD",
  "excludedFields": ["Ward Code", "Ward Name"],
  "outputSettings": {
    "top": 10,
    "above": 0.5,
    "out": "summary.json"
  }
}
```

Relative paths are resolved against the directory of the configuration file. A `top` of 0
shows every ward.

 */
